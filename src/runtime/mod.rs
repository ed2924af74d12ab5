pub mod accounts_db;
pub mod bank;
pub mod invoke_context;
pub mod svm;
pub mod sysvar;

pub use accounts_db::AccountsDB;
pub use bank::Bank;
pub use invoke_context::{BuiltinPrograms, ExecutionEnvironment, InvokeContext};
pub use svm::TransactionReceipt;
