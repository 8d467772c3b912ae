pub mod entity;
pub mod flagging;
