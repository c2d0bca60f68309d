//! Memo records and their plain-text representation
//!
//! - `record`: the `MemoRecord` type and its builder
//! - `template`: date-pattern templates around memo bodies
//! - `header`: the `<!-- id:..., ts:... -->` metadata comment
//! - `codec`: record <-> block conversion
//! - `store`: pure CRUD over a whole buffer
//! - `thread`: reply trees derived from `parent_id`
//! - `cascade`: thread-aware delete, restore and reply
//! - `visibility`: what each view shows, and in which order

pub mod cascade;
pub mod codec;
pub mod header;
pub mod record;
pub mod store;
pub mod template;
pub mod thread;
pub mod visibility;

pub use cascade::{add_reply, delete_with_descendants, restore_with_descendants, CascadeOutcome};
pub use codec::{decode, decode_with_default, encode};
pub use record::{new_memo_id, now_timestamp, MemoBuilder, MemoRecord, DELETED_PLACEHOLDER};
pub use store::{split_blocks, InsertOrder, MemoStore};
pub use template::{MemoTemplate, FALLBACK_TEMPLATE};
pub use thread::{ThreadEntry, ThreadIndex, ThreadIndexCache};
pub use visibility::{
    flat_view, has_active_replies, should_show_deleted_placeholder, sort_for_display,
    thread_view, trash_view, ThreadRow,
};
