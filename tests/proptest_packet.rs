use proptest::prelude::*;
use std::{collections::HashSet, net::Ipv4Addr, time::Instant};

use ipmi_dhcpd::{
    v4::{
        decode, encode, message::MAGIC_COOKIE, options, DhcpMessage, DhcpOption, DhcpV4Handler,
        Flags, HardwareAddr, MessageType, Opcode,
    },
    ServerConfig,
};

const FIXED_HEADER_SIZE: usize = 240;

/// Tags with a typed variant; an `Unknown` using one of these would come
/// back typed.
const TYPED_CODES: [u8; 10] = [1, 3, 6, 12, 50, 51, 54, 55, 56, 61];

fn valid_header() -> Vec<u8> {
    let mut packet = vec![0u8; FIXED_HEADER_SIZE];
    packet[0] = 1;
    packet[1] = 1;
    packet[2] = 6;
    packet[236..240].copy_from_slice(&MAGIC_COOKIE);
    packet
}

fn ipv4() -> impl Strategy<Value = Ipv4Addr> {
    any::<u32>().prop_map(Ipv4Addr::from)
}

fn opcode() -> impl Strategy<Value = Opcode> {
    prop_oneof![Just(Opcode::BootRequest), Just(Opcode::BootReply)]
}

fn message_type() -> impl Strategy<Value = MessageType> {
    prop::sample::select(vec![
        MessageType::Discover,
        MessageType::Offer,
        MessageType::Request,
        MessageType::Decline,
        MessageType::Ack,
        MessageType::Nak,
        MessageType::Release,
        MessageType::Inform,
    ])
}

fn address_option() -> impl Strategy<Value = DhcpOption> {
    prop_oneof![
        ipv4().prop_map(DhcpOption::SubnetMask),
        prop::collection::vec(ipv4(), 0..80).prop_map(DhcpOption::Router),
        prop::collection::vec(ipv4(), 0..80).prop_map(DhcpOption::DomainNameServer),
        ipv4().prop_map(DhcpOption::RequestedIpAddress),
        ipv4().prop_map(DhcpOption::ServerIdentifier),
    ]
}

fn other_option() -> impl Strategy<Value = DhcpOption> {
    let opaque_code = any::<u8>().prop_filter("tag must be opaque", |c| {
        !options::is_reserved(*c) && !TYPED_CODES.contains(c)
    });
    prop_oneof![
        "[a-z0-9-]{0,300}".prop_map(DhcpOption::Hostname),
        any::<u32>().prop_map(DhcpOption::AddressLeaseTime),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(DhcpOption::ParameterRequestList),
        "[ -~]{0,80}".prop_map(DhcpOption::Message),
        prop::collection::vec(any::<u8>(), 0..300).prop_map(DhcpOption::ClientIdentifier),
        (opaque_code, prop::collection::vec(any::<u8>(), 0..600))
            .prop_map(|(code, data)| DhcpOption::Unknown { code, data }),
    ]
}

/// Options with distinct tags, since adjacent instances of one tag decode as
/// a single option.
fn option_list() -> impl Strategy<Value = Vec<DhcpOption>> {
    prop::collection::vec(prop_oneof![address_option(), other_option()], 0..8).prop_map(|opts| {
        let mut seen = HashSet::new();
        opts.into_iter().filter(|o| seen.insert(o.code())).collect()
    })
}

fn message() -> impl Strategy<Value = DhcpMessage> {
    (
        (opcode(), any::<u8>(), any::<u8>(), any::<u32>(), any::<u16>(), any::<u16>()),
        (ipv4(), ipv4(), ipv4(), ipv4()),
        (any::<[u8; 6]>(), message_type(), option_list()),
    )
        .prop_map(
            |(
                (op, htype, hops, xid, secs, flags),
                (ciaddr, yiaddr, siaddr, giaddr),
                (chaddr, message_type, options),
            )| DhcpMessage {
                op,
                htype,
                hops,
                xid,
                secs,
                flags: Flags::new(flags),
                ciaddr,
                yiaddr,
                siaddr,
                giaddr,
                chaddr: HardwareAddr::new(chaddr),
                message_type,
                options,
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    #[test]
    fn roundtrip_encode_decode_preserves_message(msg in message()) {
        let encoded = encode(&msg);
        prop_assert!(encoded.len() >= 300);
        prop_assert_eq!(decode(&encoded), Ok(msg));
    }

    #[test]
    fn decode_never_panics_on_arbitrary_bytes(data: Vec<u8>) {
        let _ = decode(&data);
    }

    #[test]
    fn decode_never_panics_on_valid_header_with_random_options(
        options_data in prop::collection::vec(any::<u8>(), 0..512)
    ) {
        let mut packet = valid_header();
        packet.extend_from_slice(&options_data);
        let _ = decode(&packet);
    }

    #[test]
    fn decode_never_panics_on_corrupted_header(
        corrupted_bytes in prop::collection::vec(any::<u8>(), 240..600),
        corruption_indices in prop::collection::vec(0usize..240, 1..10),
        corruption_values in prop::collection::vec(any::<u8>(), 1..10)
    ) {
        let mut packet = corrupted_bytes;
        packet[236..240].copy_from_slice(&MAGIC_COOKIE);
        for (index, value) in corruption_indices.iter().zip(corruption_values.iter()) {
            packet[*index] = *value;
        }
        let _ = decode(&packet);
    }

    #[test]
    fn decode_never_panics_on_random_option_lengths(
        option_code in 1u8..254,
        option_length in any::<u8>(),
        option_data in prop::collection::vec(any::<u8>(), 0..256)
    ) {
        let mut packet = valid_header();
        packet.extend_from_slice(&[options::OPT_MESSAGE_TYPE, 1, 1]);
        packet.push(option_code);
        packet.push(option_length);
        let actual_len = (option_length as usize).min(option_data.len());
        packet.extend_from_slice(&option_data[..actual_len]);
        packet.push(options::OPT_END);
        let _ = decode(&packet);
    }

    #[test]
    fn short_packets_always_rejected(
        data in prop::collection::vec(any::<u8>(), 0..240)
    ) {
        prop_assert!(decode(&data).is_err());
    }

    #[test]
    fn bad_magic_cookie_always_rejected(cookie in any::<[u8; 4]>()) {
        prop_assume!(cookie != MAGIC_COOKIE);

        let mut packet = valid_header();
        packet[236..240].copy_from_slice(&cookie);
        packet.extend_from_slice(&[options::OPT_MESSAGE_TYPE, 1, 1, options::OPT_END]);
        prop_assert!(decode(&packet).is_err());
    }

    #[test]
    fn handler_replies_keep_request_correlators(msgs in prop::collection::vec(message(), 1..16)) {
        let server = Ipv4Addr::new(192, 168, 50, 1);
        let mut handler = DhcpV4Handler::new(ServerConfig::new(
            server,
            Ipv4Addr::new(192, 168, 50, 10),
            Ipv4Addr::new(192, 168, 50, 11),
        ));
        let now = Instant::now();
        for msg in &msgs {
            if let Some(reply) = handler.handle(msg, now) {
                prop_assert_eq!(reply.op, Opcode::BootReply);
                prop_assert_eq!(reply.xid, msg.xid);
                prop_assert_eq!(reply.chaddr, msg.chaddr);
            }
        }
    }
}
