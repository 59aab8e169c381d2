pub mod cron;
pub mod cronh;

use crate::core::Registry;

pub fn register_processes(reg: &mut Registry) {
    cronh::register(reg);
}
