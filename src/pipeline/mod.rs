//! The submission pipeline: normalize line items, assemble the worksheet
//! layout, upload assets, commit the document.

pub mod commit;
pub mod layout;
pub mod normalize;
pub mod upload;
