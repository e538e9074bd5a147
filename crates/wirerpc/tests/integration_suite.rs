use anyhow::Result;
use futures::StreamExt;
use futures::stream;
use futures::stream::BoxStream;
use wirerpc::IndexReader;
use wirerpc::IndexWriter;
use wirerpc::OutOfBand;
use wirerpc::Variant;
use wirerpc::mem::channel;
use wirerpc::read_value;
use wirerpc::resolve;
use wirerpc::transport::read_message;
use wirerpc::transport::write_message;
use wirerpc::write_value;

wirerpc::variant! {
    #[derive(Debug)]
    pub enum Reply: ReplyCase as "reply" {
        Inline(String) = 0 => "inline" { get_inline, set_inline },
        Attachment(OutOfBand<Vec<u8>>) = 1 => "attachment" { get_attachment, set_attachment },
        Nothing = 2 => "nothing" { is_nothing, set_nothing },
    }
}

#[tokio::test]
async fn test_attachment_case_travels_out_of_band() -> Result<()> {
    let (mut writer, reader) = channel();
    let reply = Reply::Attachment(OutOfBand::new(vec![1, 2, 3]));
    write_value(&mut writer, (reply,)).await?;

    // Root carries the discriminant only, the payload sits at field 0, case argument 0.
    let mut inline = reader.clone();
    assert_eq!(read_message(&mut inline, 64).await?, [0x01]);
    let mut payload = reader.index(0)?.index(0)?;
    assert_eq!(payload.path().to_string(), "/0/0");
    assert_eq!(read_message(payload.as_mut(), 64).await?, [3, 1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_attachment_resolves_on_receiver() -> Result<()> {
    let (mut writer, mut reader) = channel();
    let reply = Reply::Attachment(OutOfBand::new(b"blob".to_vec()));
    write_value(&mut writer, (7u32, reply)).await?;

    let ((n, mut reply), inc) = read_value::<(u32, Reply)>(&mut reader).await?;
    assert_eq!(n, 7);
    assert_eq!(reply.display_name(), "attachment");
    assert_eq!(reply.case(), ReplyCase::Attachment);

    resolve(&reader, inc).await?;
    let Reply::Attachment(blob) = &mut reply else {
        panic!("expected an attachment");
    };
    assert_eq!(blob.get().await?, b"blob");
    Ok(())
}

#[tokio::test]
async fn test_inline_cases_defer_nothing() -> Result<()> {
    let (mut writer, mut reader) = channel();
    let mut first = Reply::Nothing;
    first.set_inline("ok".into());
    write_value(&mut writer, (first, Reply::Nothing)).await?;

    let ((first, second), inc) = read_value::<(Reply, Reply)>(&mut reader).await?;
    assert!(inc.is_empty());
    assert_eq!(first.get_inline().map(String::as_str), Some("ok"));
    assert!(second.is_nothing());
    Ok(())
}

#[tokio::test]
async fn test_sibling_attachments_resolve_independently() -> Result<()> {
    let (mut writer, mut reader) = channel();
    let value = (
        vec![OutOfBand::new("a".to_string()), OutOfBand::new("b".to_string())],
        Some(OutOfBand::new(9u64)),
    );
    write_value(&mut writer, value).await?;

    let ((mut list, mut option), inc) =
        read_value::<(Vec<OutOfBand<String>>, Option<OutOfBand<u64>>)>(&mut reader).await?;
    let paths: Vec<String> = inc.paths().map(|p| p.to_string()).collect();
    assert_eq!(paths, ["/0/0", "/0/1", "/1/0"]);

    resolve(&reader, inc).await?;
    assert_eq!(list[0].get().await?, "a");
    assert_eq!(list[1].get().await?, "b");
    let Some(number) = option.as_mut() else {
        panic!("expected some");
    };
    assert_eq!(*number.get().await?, 9);
    Ok(())
}

// ============================================================================
//  TYPED STREAMS
// ============================================================================

#[tokio::test]
async fn test_typed_streams_roundtrip() -> Result<()> {
    let (mut writer, mut reader) = channel();
    let numbers: BoxStream<'static, u32> = stream::iter([0xc0, 0xff, 0xee]).boxed();
    let words: BoxStream<'static, String> = stream::iter(["foo", "bar"]).map(String::from).boxed();
    write_value(&mut writer, (numbers, words)).await?;

    let ((numbers, words), inc) =
        read_value::<(BoxStream<'static, u32>, BoxStream<'static, String>)>(&mut reader).await?;
    let paths: Vec<String> = inc.paths().map(|p| p.to_string()).collect();
    assert_eq!(paths, ["/0", "/1"]);

    resolve(&reader, inc).await?;
    assert_eq!(numbers.collect::<Vec<_>>().await, [0xc0, 0xff, 0xee]);
    assert_eq!(words.collect::<Vec<_>>().await, ["foo", "bar"]);
    Ok(())
}

#[tokio::test]
async fn test_typed_stream_batches_on_the_wire() -> Result<()> {
    let (mut writer, reader) = channel();
    let numbers: BoxStream<'static, u32> = stream::iter([0xc0, 0xff, 0xee]).boxed();
    write_value(&mut writer, (numbers,)).await?;

    let mut sub = reader.index(0)?;
    assert_eq!(read_message(sub.as_mut(), 64).await?, [3, 0xc0, 0x01, 0xff, 0x01, 0xee, 0x01]);
    assert_eq!(read_message(sub.as_mut(), 64).await?, [0x00]);
    assert!(sub.read(1).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_typed_stream_elements_defer_below_the_stream() -> Result<()> {
    let (mut writer, reader) = channel();
    let blobs: BoxStream<'static, OutOfBand<String>> =
        stream::iter(["a", "b"]).map(|s| OutOfBand::new(s.to_string())).boxed();
    write_value(&mut writer, (blobs,)).await?;

    // The batch carries only its length. Each payload sits below the stream.
    let mut sub = reader.index(0)?;
    assert_eq!(read_message(sub.as_mut(), 64).await?, [2]);
    let mut element = reader.index(0)?.index(1)?;
    assert_eq!(element.path().to_string(), "/0/1");
    assert_eq!(read_message(element.as_mut(), 64).await?, [1, b'b']);
    Ok(())
}

#[tokio::test]
async fn test_typed_stream_elements_resolve() -> Result<()> {
    let (mut writer, mut reader) = channel();
    let blobs: BoxStream<'static, OutOfBand<String>> =
        stream::iter(["a", "b"]).map(|s| OutOfBand::new(s.to_string())).boxed();
    write_value(&mut writer, (blobs,)).await?;

    let ((blobs,), inc) = read_value::<(BoxStream<'static, OutOfBand<String>>,)>(&mut reader).await?;
    resolve(&reader, inc).await?;
    let mut blobs = blobs.collect::<Vec<_>>().await;
    assert_eq!(blobs.len(), 2);
    assert_eq!(blobs[0].get().await?, "a");
    assert_eq!(blobs[1].get().await?, "b");
    Ok(())
}

#[tokio::test]
async fn test_typed_stream_cut_off_ends_early() -> Result<()> {
    let (mut writer, mut reader) = channel();
    write_message(&mut writer, &[]).await?;
    writer.flush().await?;
    let mut sub = writer.index(0)?;
    write_message(sub.as_mut(), &[2, 7, 8]).await?;
    sub.close().await?;

    let ((numbers,), inc) = read_value::<(BoxStream<'static, u8>,)>(&mut reader).await?;
    let err = resolve(&reader, inc).await.unwrap_err();
    assert!(matches!(err, wirerpc::Error::UnexpectedEof(_)), "{}", err);
    assert_eq!(numbers.collect::<Vec<_>>().await, [7, 8]);
    Ok(())
}
