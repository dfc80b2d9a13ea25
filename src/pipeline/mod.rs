//! Local stages that run before anything is sent to the service.
//!
//! ```text
//! input ──▶ transcode
//! (pick file)  (TIFF → JPEG, only when no sibling JPEG exists)
//! ```
//!
//! 1. [`input`]     — validate the extension, choose the file to upload,
//!    own the temporary directory of a conversion
//! 2. [`transcode`] — decode the TIFF and re-encode it as JPEG; runs in
//!    `spawn_blocking` because decoding is CPU-bound

pub mod input;
pub mod transcode;
