pub mod analyst;
pub mod conversation;
pub mod errors;
pub mod extract;
pub mod harvest;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod search;
pub mod token_counter;
pub mod tools;
