pub mod userh;

use crate::core::Registry;

pub fn register_security(reg: &mut Registry) {
    userh::register(reg);
}
