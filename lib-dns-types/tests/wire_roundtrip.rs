use arbitrary::{Arbitrary, Unstructured};
use fake::{Fake, Faker};

use dns_types::protocol::deserialise::ConsumableBuffer;
use dns_types::protocol::serialise::WritableBuffer;
use dns_types::protocol::types::*;

fn arbitrary<'a, T: Arbitrary<'a>>(buf: &'a [u8]) -> Option<T> {
    T::arbitrary(&mut Unstructured::new(buf)).ok()
}

fn arbitrary_of<T>(mut make: impl FnMut(&[u8]) -> Option<T>) -> T {
    for size in [128, 256, 512, 1024, 2048, 4096] {
        let mut buf = Vec::new();
        for _ in 0..size {
            buf.push(Faker.fake());
        }
        if let Some(value) = make(&buf) {
            return value;
        }
    }
    panic!("could not generate arbitrary value!");
}

#[test]
fn roundtrip_message() {
    for _ in 0..100 {
        let original: Message = arbitrary_of(|buf| arbitrary(buf));
        let octets = original.clone().into_octets().unwrap();
        let deserialised = Message::from_octets(&octets);

        assert_eq!(Ok(original), deserialised);
    }
}

#[test]
fn roundtrip_header() {
    for _ in 0..100 {
        let original: Header = arbitrary_of(|buf| arbitrary(buf));

        let mut buffer = WritableBuffer::default();
        original.serialise(&mut buffer);
        let deserialised = WireHeader::deserialise(&mut ConsumableBuffer::new(&buffer.octets))
            .map(|wh| wh.header);

        assert_eq!(Ok(original), deserialised);
    }
}

#[test]
fn roundtrip_resourcerecord() {
    for _ in 0..100 {
        let original: ResourceRecord = arbitrary_of(|buf| arbitrary(buf));

        let mut buffer = WritableBuffer::default();
        original.clone().serialise(&mut buffer).unwrap();
        let deserialised =
            ResourceRecord::deserialise(0, &mut ConsumableBuffer::new(&buffer.octets));

        assert_eq!(Ok(original), deserialised);
    }
}

#[test]
fn roundtrip_domainname() {
    for _ in 0..100 {
        let original: DomainName = arbitrary_of(|buf| arbitrary(buf));

        let mut buffer = WritableBuffer::default();
        original.clone().serialise(&mut buffer);
        let deserialised = DomainName::deserialise(0, &mut ConsumableBuffer::new(&buffer.octets));

        assert_eq!(Ok(original), deserialised);
    }
}
