/// A device mapped into the I/O register window.
///
/// Addresses are offsets from the start of the window (`0x0400_0000`), so
/// the same handler works whatever mirror the bus resolved.
pub trait IoDevice {
    type Address;
    type Value;

    fn read_at(&self, address: Self::Address) -> Self::Value;
    fn write_at(&mut self, address: Self::Address, value: Self::Value);
}
