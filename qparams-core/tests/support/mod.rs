use qparams_core::{ParamValue, QueryConfig};
use std::rc::Rc;

/// Initialize tracing for tests with proper test output handling
#[allow(dead_code)]
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("qparams_core=debug")),
        )
        .with_line_number(true)
        .with_target(false)
        .with_file(true)
        .try_init();
}

/// Mixed configuration: scalars, sets with `__` delimiters and a boolean
/// with a default
#[allow(dead_code)]
pub fn big_config() -> Rc<QueryConfig> {
    Rc::new(
        QueryConfig::builder()
            .number("x")
            .string("name")
            .set("coords")
            .boolean_with_default("active", false)
            .set_with_delimiter("pat", "__")
            .set_with_delimiter("rating", "__")
            .with_default(vec!["GREAT", "HORRIBLE"])
            .build()
            .expect("big config"),
    )
}

/// Small to-do filter configuration
#[allow(dead_code)]
pub fn other_config() -> Rc<QueryConfig> {
    Rc::new(
        QueryConfig::builder()
            .number("count")
            .boolean_with_default("completed", false)
            .boolean_with_default("active", false)
            .build()
            .expect("other config"),
    )
}

#[allow(dead_code)]
pub fn members(items: &[&str]) -> Option<ParamValue> {
    Some(ParamValue::set(items.iter().copied()))
}
