use crate::mem::channel;
use crate::transport::read_exact;
use crate::transport::read_message;
use crate::transport::write_message;
use crate::*;
use wirepack::Decoder;
use wirepack::Encoder;
use wirepack::IndexPath;
use wirepack::Malformed;

crate::variant! {
    #[derive(Debug, PartialEq)]
    pub enum Shape: ShapeCase as "shape" {
        Circle(u32) = 0 => "circle" { get_circle, set_circle },
        Label(String) = 1 => "label" { get_label, set_label },
        Empty = 2 => "empty" { is_empty, set_empty },
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn encode<T: Encode>(value: T) -> Result<(Vec<u8>, Outgoing)> {
    let mut enc = Encoder::new();
    let mut out = Outgoing::new();
    value.encode(&mut enc, &mut out)?;
    Ok((enc.into_bytes(), out))
}

fn decode<T: Decode>(bytes: &[u8]) -> Result<(T, Incoming)> {
    let mut dec = Decoder::new(bytes);
    let mut inc = Incoming::new();
    let value = T::decode(&mut dec, &mut inc)?;
    dec.finish()?;
    Ok((value, inc))
}

fn paths<T>(work: &wirepack::Worklist<T>) -> Vec<String> {
    work.paths().map(|p| p.to_string()).collect()
}

// ============================================================================
//  VARIANTS
// ============================================================================

#[test]
fn test_variant_inline_roundtrip() -> Result<()> {
    let (bytes, out) = encode(Shape::Circle(300))?;
    assert_eq!(bytes, [0x00, 0xac, 0x02]);
    assert!(out.is_empty());

    let (shape, inc) = decode::<Shape>(&bytes)?;
    assert_eq!(shape, Shape::Circle(300));
    assert!(inc.is_empty());

    let (bytes, _) = encode(Shape::Label("hi".into()))?;
    assert_eq!(bytes, [0x01, 0x02, b'h', b'i']);
    assert_eq!(decode::<Shape>(&bytes)?.0, Shape::Label("hi".into()));
    Ok(())
}

#[test]
fn test_payloadless_case_is_discriminant_only() -> Result<()> {
    let (bytes, out) = encode(Shape::Empty)?;
    assert_eq!(bytes, [0x02]);
    assert!(out.is_empty());

    let (shape, _) = decode::<Shape>(&bytes)?;
    assert_eq!(shape.display_name(), "empty");
    Ok(())
}

#[test]
fn test_getters_match_exactly_one_case() {
    let mut shape = Shape::Empty;
    assert!(shape.is_empty());
    assert_eq!(shape.get_circle(), None);
    assert_eq!(shape.get_label(), None);

    shape.set_circle(9);
    assert_eq!(shape.get_circle(), Some(&9));
    assert!(!shape.is_empty());
    assert_eq!(shape.get_label(), None);
    assert_eq!(shape.case(), ShapeCase::Circle);

    shape.set_label("x".into()).set_empty();
    assert!(shape.is_empty());
    assert_eq!(shape.discriminant(), 2);
}

#[test]
fn test_case_selector_conversions() -> Result<()> {
    assert_eq!(ShapeCase::try_from(1)?, ShapeCase::Label);
    assert_eq!(u32::from(ShapeCase::Empty), 2);
    assert_eq!(Shape::CASES, &[(0, "circle"), (1, "label"), (2, "empty")]);
    Ok(())
}

#[test]
fn test_unknown_discriminant_is_malformed() {
    let err = decode::<Shape>(&[0x09]).unwrap_err();
    assert!(err.is_malformed());
    assert_eq!(
        err,
        Error::from(Malformed::UnknownDiscriminant { ty: "shape", discriminant: 9 })
    );
}

#[test]
fn test_truncated_payload() {
    // Circle announced, payload missing.
    let err = decode::<Shape>(&[0x00]).unwrap_err();
    assert_eq!(err, Error::Pack(wirepack::Error::UnexpectedEnd));
}

#[test]
#[should_panic(expected = "invalid variant")]
fn test_case_name_outside_declared_set_panics() {
    case_name::<Shape>(7);
}

// ============================================================================
//  VALUES AND PATHS
// ============================================================================

#[test]
fn test_composite_roundtrip() -> Result<()> {
    type Call = (Option<u64>, std::result::Result<String, i32>, Vec<char>, bool);
    let value: Call = (Some(u64::MAX), Err(-3), vec!['a', 'λ'], true);

    let (bytes, _) = encode(value.clone())?;
    let (back, _) = decode::<Call>(&bytes)?;
    assert_eq!(back, value);
    Ok(())
}

#[test]
fn test_out_of_band_contributes_nothing_inline() -> Result<()> {
    let (bytes, out) = encode((1u8, OutOfBand::new("bulk".to_string())))?;
    assert_eq!(bytes, [0x01]);
    assert_eq!(paths(&out), ["/1"]);
    Ok(())
}

#[test]
fn test_nested_positions_scope_paths() -> Result<()> {
    let value = Some((5u32, OutOfBand::new(1u8)));
    let (_, out) = encode(value)?;
    assert_eq!(paths(&out), ["/0/1"]);

    let list = vec![OutOfBand::new(1u8), OutOfBand::new(2u8)];
    let (bytes, out) = encode(list)?;
    assert_eq!(bytes, [0x02]);
    assert_eq!(paths(&out), ["/0", "/1"]);

    let (_, inc) = decode::<Vec<OutOfBand<u8>>>(&bytes)?;
    assert_eq!(paths(&inc), ["/0", "/1"]);
    Ok(())
}

#[tokio::test]
async fn test_abandoned_placeholder() -> Result<()> {
    let (mut placeholder, inc) = decode::<(OutOfBand<String>,)>(&[])?;
    assert_eq!(placeholder.0.path(), Some(&IndexPath::from(vec![0])));
    drop(inc);

    let err = placeholder.0.get().await.unwrap_err();
    assert_eq!(err, Error::Abandoned(IndexPath::from(vec![0])));
    Ok(())
}

#[test]
fn test_worklists_are_debug() -> Result<()> {
    let (_, out) = encode((OutOfBand::new(1u8),))?;
    assert!(format!("{:?}", out).contains("DeferredWrite"));

    let (_, inc) = decode::<(OutOfBand<u8>,)>(&[])?;
    assert!(format!("{:?}", inc).contains("DeferredRead"));
    Ok(())
}

// ============================================================================
//  IN-MEMORY CARRIER
// ============================================================================

#[tokio::test]
async fn test_routing_is_deterministic() -> Result<()> {
    init_tracing();
    let (writer, mut reader) = channel();

    let mut a = route(&writer, 2)?;
    let mut b = route(&writer, 2)?;
    assert_eq!(a.path(), b.path());

    a.write(b"ab").await?;
    a.flush().await?;
    b.write(b"cd").await?;
    b.flush().await?;

    let mut sub = reader.index(2)?;
    assert_eq!(read_exact(sub.as_mut(), 4).await?, b"abcd");
    drop((a, b, writer));
    assert!(sub.read(16).await?.is_empty());
    assert!(reader.read(16).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sub_channels_are_demultiplexed() -> Result<()> {
    let (writer, reader) = channel();

    let mut deep = route_path(&writer, &[1, 4])?;
    let mut shallow = route(&writer, 0)?;
    deep.write(b"deep").await?;
    deep.close().await?;
    shallow.write(b"shallow").await?;
    shallow.close().await?;

    // Reading /0 first buffers the earlier /1/4 frames.
    let mut r0 = reader.index(0)?;
    assert_eq!(read_exact(r0.as_mut(), 7).await?, b"shallow");
    assert!(r0.read(1).await?.is_empty());

    let mut r14 = reader.index(1)?.index(4)?;
    assert_eq!(r14.path(), &IndexPath::from(vec![1, 4]));
    assert_eq!(read_exact(r14.as_mut(), 4).await?, b"deep");
    Ok(())
}

#[tokio::test]
async fn test_routing_fails_once_reader_is_gone() {
    let (writer, reader) = channel();
    drop(reader);

    match route(&writer, 0) {
        Err(Error::RoutingFailed { path, .. }) => assert_eq!(path, IndexPath::from(vec![0])),
        other => panic!("expected RoutingFailed, got {:?}", other.map(|w| w.path().clone())),
    }
}

#[tokio::test]
async fn test_route_path_requires_a_sub_channel() {
    let (writer, _reader) = channel();
    assert!(matches!(route_path(&writer, &[]), Err(Error::RoutingFailed { .. })));
}

#[tokio::test]
async fn test_read_message_mid_frame_eof() -> Result<()> {
    let (mut writer, mut reader) = channel();
    writer.write(&[5, 1, 2]).await?;
    writer.close().await?;

    let err = read_message(&mut reader, 64).await.unwrap_err();
    assert_eq!(err, Error::UnexpectedEof(IndexPath::root()));
    Ok(())
}

#[tokio::test]
async fn test_routing_alone_sends_nothing() -> Result<()> {
    let (writer, reader) = channel();
    let mut deep = route_path(&writer, &[1, 0])?;
    write_message(deep.as_mut(), b"deep").await?;
    deep.close().await?;

    let mut r10 = reader.index(1)?.index(0)?;
    assert_eq!(read_message(r10.as_mut(), 64).await?, b"deep");
    assert!(r10.read(1).await?.is_empty());

    // /1 was only routed through, so it is still open.
    let mut parent = route(&writer, 1)?;
    parent.write(b"late").await?;
    parent.close().await?;
    let mut r1 = reader.index(1)?;
    assert_eq!(read_exact(r1.as_mut(), 4).await?, b"late");
    assert!(r1.read(1).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_finished_inboxes_are_released() -> Result<()> {
    let (writer, reader) = channel();
    for i in 0..3 {
        let mut w = route(&writer, i)?;
        write_message(w.as_mut(), b"x").await?;
        w.close().await?;
    }

    for i in 0..3 {
        let mut r = reader.index(i)?;
        assert_eq!(read_message(r.as_mut(), 8).await?, b"x");
        assert!(r.read(1).await?.is_empty());
        assert!(r.read(1).await?.is_empty());
    }
    assert_eq!(reader.open_inboxes(), 0);
    Ok(())
}

// ============================================================================
//  CALLS
// ============================================================================

#[tokio::test]
async fn test_inline_value_over_channel() -> Result<()> {
    let (mut writer, mut reader) = channel();
    write_value(&mut writer, (7u32, Shape::Label("hi".into()))).await?;

    let (value, inc) = read_value::<(u32, Shape)>(&mut reader).await?;
    assert_eq!(value, (7, Shape::Label("hi".into())));
    assert!(inc.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_out_of_band_over_channel() -> Result<()> {
    init_tracing();
    let (mut writer, mut reader) = channel();

    let send = tokio::spawn(async move {
        write_value(&mut writer, (1u32, OutOfBand::new("payload".to_string()))).await
    });

    let ((n, mut text), inc) = read_value::<(u32, OutOfBand<String>)>(&mut reader).await?;
    assert_eq!(n, 1);
    assert!(text.try_get().is_none());

    resolve(&reader, inc).await?;
    assert_eq!(text.get().await?, "payload");
    send.await.expect("writer task panicked")?;
    Ok(())
}

#[tokio::test]
async fn test_nested_out_of_band_lives_below_parent() -> Result<()> {
    let (mut writer, reader) = channel();
    let value = (OutOfBand::new(OutOfBand::new("deep".to_string())),);
    write_value(&mut writer, value).await?;

    // Outer payload at /0 is empty inline, the string itself travels on /0/0.
    let mut outer = reader.index(0)?;
    assert_eq!(read_message(outer.as_mut(), 64).await?, Vec::<u8>::new());
    let mut inner = reader.index(0)?.index(0)?;
    assert_eq!(read_message(inner.as_mut(), 64).await?, [4, b'd', b'e', b'e', b'p']);
    Ok(())
}

#[tokio::test]
async fn test_nested_out_of_band_resolves() -> Result<()> {
    let (mut writer, mut reader) = channel();
    let value = (OutOfBand::new(OutOfBand::new("deep".to_string())),);
    write_value(&mut writer, value).await?;

    let ((outer,), inc) = read_value::<(OutOfBand<OutOfBand<String>>,)>(&mut reader).await?;
    let resolver = reader.clone();
    let task = tokio::spawn(async move { resolve(&resolver, inc).await });

    let mut inner = outer.into_inner().await?;
    assert_eq!(inner.path(), Some(&IndexPath::from(vec![0, 0])));
    assert_eq!(inner.get().await?, "deep");
    task.await.expect("resolver panicked")?;
    Ok(())
}

#[tokio::test]
async fn test_placeholder_can_be_forwarded() -> Result<()> {
    let (mut wa, mut ra) = channel();
    let (mut wb, mut rb) = channel();
    write_value(&mut wa, (OutOfBand::new(42u64),)).await?;

    let (relayed, inc) = read_value::<(OutOfBand<u64>,)>(&mut ra).await?;
    let forward = tokio::spawn(async move { write_value(&mut wb, relayed).await });
    resolve(&ra, inc).await?;
    forward.await.expect("forwarder panicked")?;

    let ((mut value,), inc) = read_value::<(OutOfBand<u64>,)>(&mut rb).await?;
    resolve(&rb, inc).await?;
    assert_eq!(*value.get().await?, 42);
    Ok(())
}

#[tokio::test]
async fn test_message_limit() -> Result<()> {
    let (mut writer, mut reader) = channel();
    write_value(&mut writer, "x".repeat(100)).await?;

    let config = Config::new().max_message_len(10);
    let err = read_value_with::<String>(&mut reader, &config).await.unwrap_err();
    assert_eq!(err, Error::MessageTooLarge { len: 101, max: 10 });
    Ok(())
}

#[tokio::test]
async fn test_deferral_onto_root_is_rejected() -> Result<()> {
    let (mut writer, mut reader) = channel();
    let err = write_value(&mut writer, OutOfBand::new(1u8)).await.unwrap_err();
    assert!(matches!(err, Error::RoutingFailed { .. }));

    // Nothing reached the wire.
    drop(writer);
    assert!(reader.read(8).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_framed_messages_are_self_delimited() -> Result<()> {
    let (mut writer, mut reader) = channel();
    write_message(&mut writer, b"one").await?;
    write_message(&mut writer, b"").await?;
    write_message(&mut writer, b"three").await?;
    writer.close().await?;

    assert_eq!(read_message(&mut reader, 64).await?, b"one");
    assert_eq!(read_message(&mut reader, 64).await?, b"");
    assert_eq!(read_message(&mut reader, 64).await?, b"three");
    assert!(matches!(read_message(&mut reader, 64).await, Err(Error::UnexpectedEof(_))));
    Ok(())
}
