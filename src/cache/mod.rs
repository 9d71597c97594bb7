pub(crate) mod outline_snapshot;

pub(crate) use outline_snapshot::{
    load_outline_snapshot, outline_from_snapshot, remove_outline_snapshot, save_outline_snapshot,
};
