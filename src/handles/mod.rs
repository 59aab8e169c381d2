pub mod processes;
pub mod security;

use crate::core::Registry;

pub fn register_all(reg: &mut Registry) {
    processes::register_processes(reg);
    security::register_security(reg);
}
