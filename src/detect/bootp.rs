//! BOOTP frame inspection.
//!
//! Wireless buttons announce a press by waking up and broadcasting a DHCP
//! DISCOVER (a BOOTP request). The only thing this process needs from the
//! frame is the client hardware address, which sits at a fixed offset in the
//! BOOTP header:
//!
//! ```text
//! offset  field
//!      0  op      (1 = BOOTREQUEST)
//!      1  htype   (1 = Ethernet)
//!      2  hlen    (6 for a MAC)
//!      4  xid
//!     28  chaddr  (16 bytes, first `hlen` used)
//! ```

/// BOOTREQUEST opcode.
const OP_REQUEST: u8 = 1;
/// Hardware type for Ethernet.
const HTYPE_ETHERNET: u8 = 1;
/// Length of an Ethernet hardware address.
const HLEN_ETHERNET: u8 = 6;
/// Offset of the client hardware address field.
const CHADDR_OFFSET: usize = 28;
/// Fixed BOOTP header length; anything shorter is not a BOOTP message.
const BOOTP_FIXED_LEN: usize = 236;

/// Extracts the client hardware address from a BOOTP request frame.
///
/// Returns `None` for anything that is not a plausible Ethernet BOOTREQUEST;
/// the listener treats that as unrelated broadcast noise, not an error.
pub fn client_hardware_address(frame: &[u8]) -> Option<String> {
    if frame.len() < BOOTP_FIXED_LEN {
        return None;
    }
    if frame[0] != OP_REQUEST || frame[1] != HTYPE_ETHERNET || frame[2] != HLEN_ETHERNET {
        return None;
    }

    let mac = &frame[CHADDR_OFFSET..CHADDR_OFFSET + HLEN_ETHERNET as usize];
    Some(
        mac.iter()
            .map(|octet| format!("{:02x}", octet))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discover_frame(mac: [u8; 6]) -> Vec<u8> {
        let mut frame = vec![0u8; BOOTP_FIXED_LEN];
        frame[0] = OP_REQUEST;
        frame[1] = HTYPE_ETHERNET;
        frame[2] = HLEN_ETHERNET;
        frame[CHADDR_OFFSET..CHADDR_OFFSET + 6].copy_from_slice(&mac);
        frame
    }

    #[test]
    fn extracts_address_from_discover() {
        let frame = discover_frame([0xac, 0x63, 0xbe, 0x2a, 0x11, 0xb0]);
        assert_eq!(
            client_hardware_address(&frame).as_deref(),
            Some("ac:63:be:2a:11:b0")
        );
    }

    #[test]
    fn pads_single_digit_octets() {
        let frame = discover_frame([0x00, 0x01, 0x0a, 0xff, 0x00, 0x09]);
        assert_eq!(
            client_hardware_address(&frame).as_deref(),
            Some("00:01:0a:ff:00:09")
        );
    }

    #[test]
    fn rejects_truncated_frames() {
        let frame = discover_frame([0xac, 0x63, 0xbe, 0x2a, 0x11, 0xb0]);
        assert_eq!(client_hardware_address(&frame[..64]), None);
        assert_eq!(client_hardware_address(&[]), None);
    }

    #[test]
    fn rejects_replies() {
        let mut frame = discover_frame([0xac, 0x63, 0xbe, 0x2a, 0x11, 0xb0]);
        frame[0] = 2; // BOOTREPLY
        assert_eq!(client_hardware_address(&frame), None);
    }

    #[test]
    fn rejects_non_ethernet_hardware() {
        let mut frame = discover_frame([0xac, 0x63, 0xbe, 0x2a, 0x11, 0xb0]);
        frame[1] = 6; // IEEE 802
        assert_eq!(client_hardware_address(&frame), None);

        let mut frame = discover_frame([0xac, 0x63, 0xbe, 0x2a, 0x11, 0xb0]);
        frame[2] = 8;
        assert_eq!(client_hardware_address(&frame), None);
    }
}
