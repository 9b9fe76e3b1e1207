pub mod auto_transfer;
pub mod customer;
pub mod directory;
pub mod history;
pub mod operator;
pub mod work_item;
