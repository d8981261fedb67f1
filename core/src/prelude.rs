pub use crate::avm1::{ObjectId, Value};
pub use crate::context::VmContext;
pub use crate::display_object::{DisplayHandle, DisplayRef};
pub use crate::string_table::{NameId, ObjectUri};
pub use log::{error, info, trace, warn};
