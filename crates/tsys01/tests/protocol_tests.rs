use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{
    ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation,
};
use tsys01::{temperature_from_adc, Error, Tsys01, DEFAULT_ADDRESS};

const CALIB: [u16; 8] = [0, 28446, 24926, 36016, 32791, 40781, 0, 0];
const ADC: u32 = 9_378_708;

struct NoopDelay;

impl DelayNs for NoopDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

struct FakeChip {
    converting: bool,
    nack_all: bool,
}

impl ErrorType for FakeChip {
    type Error = ErrorKind;
}

impl I2c for FakeChip {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), ErrorKind> {
        assert_eq!(address, DEFAULT_ADDRESS);
        if self.nack_all {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        let cmd = match operations.first() {
            Some(Operation::Write(bytes)) => bytes[0],
            _ => panic!("transaction must start with a command write"),
        };

        let response: Option<[u8; 4]> = match cmd {
            0x1E => None,
            0x48 => {
                self.converting = true;
                None
            }
            0x00 => {
                assert!(self.converting, "ADC read without conversion");
                Some(ADC.to_be_bytes())
            }
            c if (0xA0..=0xAE).contains(&c) && c % 2 == 0 => {
                let word = CALIB[usize::from((c - 0xA0) / 2)];
                let be = word.to_be_bytes();
                Some([0, 0, be[0], be[1]])
            }
            c => panic!("unexpected command {c:#04x}"),
        };

        if let Some(Operation::Read(buf)) = operations.get_mut(1) {
            let data = response.expect("read after write-only command");
            buf.copy_from_slice(&data[4 - buf.len()..]);
        }
        Ok(())
    }
}

#[futures_test::test]
async fn read_initializes_lazily_and_converts() {
    let chip = FakeChip { converting: false, nack_all: false };
    let mut dev = Tsys01::new(chip, NoopDelay);

    let t = dev.read().await.unwrap();
    assert!(dev.is_initialized());
    assert_eq!(dev.calibration(), &CALIB);
    assert_eq!(t, temperature_from_adc(&CALIB, ADC));
}

#[futures_test::test]
async fn init_failure_surfaces_as_read_failure() {
    let chip = FakeChip { converting: false, nack_all: true };
    let mut dev = Tsys01::new(chip, NoopDelay);

    assert!(matches!(dev.read().await, Err(Error::Bus(_))));
    assert!(!dev.is_initialized());
}
