//! reeltext Overlay Model
//!
//! Defines the core data contracts for an editing session:
//! - **Overlay:** Timed, styled text annotations and partial patches
//! - **Layout:** The aspect-preserving draw rectangle inside a surface
//! - **Store:** The ordered overlay collection with a selection pointer
//! - **Commands:** Edit commands emitted by a property-editing UI
//! - **Source:** Metadata of the video being annotated
//!
//! Overlay positions are percentages `[0, 100]` of the video-content area,
//! so they survive container resizes.

pub mod command;
pub mod error;
pub mod layout;
pub mod overlay;
pub mod source;
pub mod store;
pub mod style;

pub use command::*;
pub use error::*;
pub use layout::*;
pub use overlay::*;
pub use source::*;
pub use store::*;
pub use style::*;
