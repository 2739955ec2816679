use s31_hal::{LinkProperties, ResetCause, ScratchMemory, SerialPort};
use s31_core::{S31Error, S31Result};

struct Loopback {
    rx: Vec<u8>,
}

impl SerialPort for Loopback {
    fn properties(&self) -> LinkProperties {
        LinkProperties { baud_rate: 4800, even_parity: true }
    }
    fn available(&mut self) -> usize {
        self.rx.len()
    }
    fn read(&mut self) -> nb::Result<u8, S31Error> {
        if self.rx.is_empty() {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(self.rx.remove(0))
        }
    }
}

struct Ram([u8; 8]);

impl ScratchMemory for Ram {
    fn capacity(&self) -> usize { self.0.len() }
    fn read(&self, offset: usize, buf: &mut [u8]) -> S31Result<()> {
        let end = offset + buf.len();
        if end > self.0.len() { return Err(S31Error::HalError); }
        buf.copy_from_slice(&self.0[offset..end]);
        Ok(())
    }
    fn write(&mut self, offset: usize, data: &[u8]) -> S31Result<()> {
        let end = offset + data.len();
        if end > self.0.len() { return Err(S31Error::HalError); }
        self.0[offset..end].copy_from_slice(data);
        Ok(())
    }
}

#[test]
fn test_serial_object_safety() {
    let mut dev = Loopback { rx: vec![1, 2, 3] };
    let obj: &mut dyn SerialPort = &mut dev;

    assert_eq!(obj.properties().baud_rate, 4800);
    assert_eq!(obj.available(), 3);

    let mut buf = [0u8; 8];
    assert_eq!(obj.read_available(&mut buf), 3);
    assert_eq!(&buf[..3], &[1, 2, 3]);
    assert!(matches!(obj.read(), Err(nb::Error::WouldBlock)));
}

#[test]
fn test_scratch_bounds() {
    let mut ram = Ram([0; 8]);
    let obj: &mut dyn ScratchMemory = &mut ram;
    assert!(obj.write(6, &[1, 2, 3]).is_err());
    obj.write(4, &[9, 9]).unwrap();
    let mut out = [0u8; 2];
    obj.read(4, &mut out).unwrap();
    assert_eq!(out, [9, 9]);
}

#[test]
fn test_reset_cause_classes() {
    assert!(ResetCause::HardwareWatchdog.preserves_scratch());
    assert!(ResetCause::External.preserves_scratch());
    assert!(!ResetCause::PowerOn.preserves_scratch());
    assert!(ResetCause::PowerOn.is_cold());
    assert!(!ResetCause::SoftwareRestart.is_cold());
    assert_eq!("wdt".parse::<ResetCause>(), Ok(ResetCause::HardwareWatchdog));
    assert!("bogus".parse::<ResetCause>().is_err());
}
