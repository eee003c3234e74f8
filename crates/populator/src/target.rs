//! Destination selection
//!
//! The controller knows whether the claim is a raw block volume; the worker
//! does not. The choice is therefore made once, when the worker's arguments
//! are built, and reaches the worker as `--file-name`.

/// Directory the claim is mounted at for filesystem volumes
pub const MOUNT_PATH: &str = "/mnt/";

/// Image file written inside [`MOUNT_PATH`]
pub const DISK_IMAGE_NAME: &str = "disk.img";

/// Device path the claim is attached at for raw block volumes
pub const DEVICE_PATH: &str = "/dev/block";

/// Path `ovirt-img` writes to.
pub fn destination_path(raw_block: bool) -> String {
    if raw_block {
        DEVICE_PATH.to_string()
    } else {
        format!("{MOUNT_PATH}{DISK_IMAGE_NAME}")
    }
}

/// Mount point of the claim inside the worker pod (no trailing slash)
pub fn mount_dir() -> &'static str {
    MOUNT_PATH.trim_end_matches('/')
}
