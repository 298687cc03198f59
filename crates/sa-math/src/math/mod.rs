//! Core math modules.

pub mod gamma;
pub mod normal;
pub mod proportion;
pub mod robust;
pub mod rolling;
pub mod stable;
