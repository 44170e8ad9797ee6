/// Delivery level requested for a publish or subscription
///
/// Passed through to the transport untouched.
#[repr(u8)]
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}
