//! Images compiled into the binary.

pub static FAVICON_JPG: &[u8] = include_bytes!("../../assets/favicon.jpg");

/// Front panel artwork the status page draws its lamps and buttons over.
pub static BUTTON_IMAGE_JPG: &[u8] = include_bytes!("../../assets/buttons.jpg");
