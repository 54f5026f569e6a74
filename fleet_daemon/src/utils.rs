pub mod cancellation;
#[cfg(test)]
pub mod test_utilities;
