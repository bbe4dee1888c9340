/// Process-wide configuration queries an engine makes outside of any
/// single method compilation.
pub trait ConfigHost {
    fn get_int_config(&self, name: &str, default: i32) -> i32;

    fn get_string_config(&self, name: &str) -> Option<String>;
}
