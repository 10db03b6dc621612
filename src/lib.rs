//! Read-only access to git packfiles
//!
//! Open a `.idx`/`.pack` pair with [`Pack::open`], or all packs of a
//! repository with [`PackSet::open`], and read fully resolved objects by
//! identifier. Nothing is ever written.

pub mod areas;
pub mod artifacts;
pub mod error;

pub use areas::pack::Pack;
pub use areas::pack_file::PackFile;
pub use areas::pack_index::PackIndex;
pub use areas::pack_set::PackSet;
pub use artifacts::database::object_locator::{FnLocator, ObjectLocator};
pub use artifacts::objects::object::{Object, RawObject};
pub use artifacts::objects::object_id::{ObjectFormat, ObjectId};
pub use artifacts::objects::object_type::ObjectType;
pub use artifacts::objects::pack_object::{Delta, DeltaBase, PackObject, PackObjectKind};
pub use artifacts::pack::limits::DeltaLimits;
pub use error::{ChainLink, PackError, PackResult};
