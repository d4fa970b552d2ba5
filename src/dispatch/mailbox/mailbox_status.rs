use num_enum::TryFromPrimitive;

/// Bit layout of the mailbox status word.
///
/// Bit 0 marks a closed mailbox, bit 1 the scheduled ("mailbox lock") flag,
/// and everything above counts nested suspensions in units of
/// `SuspendUnit`.
#[derive(Debug, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum MailboxStatus {
  Open = 0,
  Closed = 1,
  Scheduled = 2,
  ShouldScheduleMask = 3,
  ShouldNotProcessMask = !2,
  SuspendMask = !3,
  SuspendUnit = 4,
}
