//! Host transaction bookkeeping around a render step.

/// Callbacks the host uses to pair pending-update notifications with the
/// layer's render steps.
///
/// The layer invokes each method exactly once per render step, whether or not
/// anything ends up being drawn.
pub trait TransactionCallbacks {
    /// Fired before the layer looks at its producer.
    fn will_render(&mut self);

    /// Fired once the producer's content has been consumed.
    fn did_render(&mut self);
}

/// Hosts without transaction bookkeeping.
impl TransactionCallbacks for () {
    fn will_render(&mut self) {}

    fn did_render(&mut self) {}
}
