use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Initializes the process-wide Snowflake ID generator.
///
/// `machine_id` and `node_id` are 0-31; distinct values keep IDs unique
/// across paired instances.
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR.lock().unwrap();
    *gen = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Returns the next Snowflake ID as a string.
///
/// Falls back to generator (1, 1) when [`init`] was never called, so tests
/// and library consumers need no setup.
pub fn next_id() -> String {
    let mut gen = ID_GENERATOR.lock().unwrap();
    let bucket = gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id().to_string()
}
