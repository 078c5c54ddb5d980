pub mod task;
pub mod user;

pub use task::{
    Page, Task, TaskFilter, TaskInput, TaskList, TaskPatch, TaskPriority, TaskQuery, TaskStats,
};
pub use user::{NewUser, User, UserProfile};
