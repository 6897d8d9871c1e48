use crate::{error::BridgeError, log_error};
use elcon_tc::{ChargerAddress, Frame, FrameKind, FRAME_LEN};
use futures_util::StreamExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_socketcan::{CANFrame, CANSocket};

pub type CanSend = mpsc::Sender<CANFrame>;
pub type CanRecv = mpsc::Receiver<CANFrame>;
pub type CanChannel = (CanSend, CanRecv);

pub fn can_channel() -> CanChannel {
    mpsc::channel::<CANFrame>(100)
}

/// Application side of the bus. `tx` queues frames for the socket, `rx`
/// yields every frame the socket receives.
pub struct CanLink {
    pub tx: CanSend,
    pub rx: CanRecv,
}

impl CanLink {
    pub fn new(tx: CanSend, rx: CanRecv) -> Self {
        Self { tx, rx }
    }

    /// Opens `interface` and spawns the task that owns the socket.
    pub fn open(interface: &str) -> Result<(Self, JoinHandle<()>), BridgeError> {
        let socket = CANSocket::open(interface).map_err(BridgeError::CanOpen)?;
        let (to_app, rx) = can_channel();
        let (tx, from_app) = can_channel();
        let handle = tokio::spawn(can_task(socket, interface.to_owned(), to_app, from_app));
        Ok((Self::new(tx, rx), handle))
    }

    pub async fn send(&self, frame: CANFrame) -> Result<(), BridgeError> {
        log::trace!(">> {:08x}: {:02x?}", frame.id(), frame.data());
        self.tx.send(frame).await.map_err(|_| BridgeError::LinkClosed)
    }
}

async fn can_task(mut socket: CANSocket, name: String, to_app: CanSend, mut from_app: CanRecv) {
    log::info!("Starting {name} thread");
    loop {
        tokio::select! {
            rx = socket.next() => match rx {
                Some(Ok(f)) => {
                    log::trace!("{name} << {:08x}: {:02x?}", f.id(), f.data());
                    if to_app.send(f).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => log::error!("{name} rx error {e:?}"),
                None => break,
            },
            tx = from_app.recv() => match tx {
                Some(f) => log_error!(format!("{name} tx"), write(&socket, f).await),
                None => break,
            },
        }
    }
    log::info!("{name} thread stopped");
}

async fn write(socket: &CANSocket, frame: CANFrame) -> Result<(), BridgeError> {
    socket
        .write_frame(frame)
        .map_err(BridgeError::CanBusWrite)?
        .await
        .map_err(BridgeError::CanBusWriteIo)
}

/// 29 bit data frame
pub fn to_can_frame(id: u32, data: &[u8; FRAME_LEN]) -> Result<CANFrame, BridgeError> {
    CANFrame::new(id, data, false, false).map_err(|_| BridgeError::FrameConstruction(id))
}

/// Maps a received frame to its message through the charger's ids.
pub fn classify(frame: &CANFrame, address: ChargerAddress) -> Result<Frame, BridgeError> {
    let kind = FrameKind::from_id(frame.id(), address)?;
    Ok(elcon_tc::decode(kind, frame.data())?)
}

#[cfg(test)]
mod test {
    use super::*;
    use elcon_tc::{CommandFrame, ElconError, StatusFrame};

    #[test]
    fn classify_test() {
        let addr = ChargerAddress::E5;
        let frame = CANFrame::new(
            0x1806E5F4,
            &[0x03, 0xD4, 0x00, 0xA0, 0x00, 0x00, 0x00, 0x00],
            false,
            false,
        )
        .unwrap();
        assert!(frame.is_extended());
        assert_eq!(
            classify(&frame, addr).unwrap(),
            Frame::Command(CommandFrame::new(98.0, 16.0, false))
        );

        let frame = CANFrame::new(
            0x18FF50E5,
            &[0x03, 0xD4, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00],
            false,
            false,
        )
        .unwrap();
        let Frame::Status(status) = classify(&frame, addr).unwrap() else {
            panic!("expected status")
        };
        assert!(status.status_flags.communication);
        assert_eq!(status.output_voltage, 98.0);
    }

    #[test]
    fn classify_unknown_and_short() {
        let frame = CANFrame::new(0x18FF50E7, &[0; 8], false, false).unwrap();
        assert!(matches!(
            classify(&frame, ChargerAddress::E5),
            Err(BridgeError::Protocol(ElconError::UnknownFrameKind(0x18FF50E7)))
        ));
        let frame = CANFrame::new(0x18FF50E5, &[0x03, 0xD4], false, false).unwrap();
        assert!(matches!(
            classify(&frame, ChargerAddress::E5),
            Err(BridgeError::Decode(_))
        ));
    }

    #[test]
    fn to_can_frame_test() {
        let data = StatusFrame::default().encode().unwrap();
        let frame = to_can_frame(ChargerAddress::E9.status_id(), &data).unwrap();
        assert_eq!(frame.id(), 0x18FF50E9);
        assert_eq!(frame.data(), &data);
        assert!(to_can_frame(0x2000_0000, &data).is_err());
    }
}
