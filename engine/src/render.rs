use std::{
    fs,
    io::{self, Cursor},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use image::{DynamicImage, RgbaImage};
use log::debug;
use reqwest::Client;

use crate::{JobResult, OutputFormat, error::Result};

pub const FILE_PREFIX: &str = "flux_image";

/// The encoded image offered for saving
#[derive(Debug, Clone)]
pub struct DownloadArtifact {
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl DownloadArtifact {
    /// Writes the artifact into `dir`. An existing file with the same name is
    /// never overwritten, a counter is appended instead.
    pub fn save_into(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = Path::new(&self.file_name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(FILE_PREFIX);
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut target = dir.join(&self.file_name);
        let mut n = 1;
        while target.exists() {
            target = dir.join(format!("{stem}_{n}.{ext}"));
            n += 1;
        }
        fs::write(&target, &self.bytes)?;
        Ok(target)
    }
}

/// A decoded result, ready to be displayed and downloaded. Replaced on every
/// generation, nothing is cached.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub bitmap: RgbaImage,
    pub download: DownloadArtifact,
}

impl RenderedImage {
    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }
}

/// Fetches the first image of `result` and turns it into a [`RenderedImage`]
pub async fn render(
    client: &Client,
    result: &JobResult,
    output_format: OutputFormat,
    submitted_at: SystemTime,
) -> Result<RenderedImage> {
    let image = result.first_image()?;
    let bytes = fetch_image(client, &image.url).await?;
    render_bytes(&bytes, output_format, submitted_at)
}

pub async fn fetch_image(client: &Client, url: &str) -> Result<Bytes> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    debug!("Fetched {} bytes from {url}", bytes.len());
    Ok(bytes)
}

/// Decodes `src` (whatever format it arrived in) and re-encodes it as `output_format`
pub fn render_bytes(
    src: &[u8],
    output_format: OutputFormat,
    submitted_at: SystemTime,
) -> Result<RenderedImage> {
    let decoded = image::load_from_memory(src)?;
    let bytes = encode(&decoded, output_format)?;
    Ok(RenderedImage {
        bitmap: decoded.to_rgba8(),
        download: DownloadArtifact {
            file_name: file_name(output_format, submitted_at),
            media_type: output_format.media_type(),
            bytes,
        },
    })
}

pub fn encode(img: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>> {
    let mut out = Cursor::new(vec![]);
    match format {
        // jpeg has no alpha channel
        OutputFormat::Jpeg => {
            DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut out, format.image_format())?
        }
        OutputFormat::Png => img.write_to(&mut out, format.image_format())?,
    }
    Ok(out.into_inner())
}

pub fn file_name(format: OutputFormat, submitted_at: SystemTime) -> String {
    let secs = submitted_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{FILE_PREFIX}_{secs}.{}", format.extension())
}

#[cfg(test)]
pub(crate) mod test {
    use std::time::Duration;

    use image::{ImageFormat, Rgba};
    use serde_json::json;

    use super::*;
    use crate::{
        error::GenerationError,
        test_server::{Reply, TestServer},
    };

    pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 10) as u8, (y * 10) as u8, 128, 255])
        });
        encode(&DynamicImage::ImageRgba8(img), OutputFormat::Png).unwrap()
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn reencodes_into_chosen_format() {
        let src = sample_png(12, 7);

        let rendered = render_bytes(&src, OutputFormat::Jpeg, at(1700000000)).unwrap();
        assert_eq!(rendered.download.media_type, "image/jpeg");
        assert_eq!(rendered.download.file_name, "flux_image_1700000000.jpeg");
        assert_eq!(
            image::guess_format(&rendered.download.bytes).unwrap(),
            ImageFormat::Jpeg
        );

        let roundtrip = image::load_from_memory(&rendered.download.bytes).unwrap();
        assert_eq!((roundtrip.width(), roundtrip.height()), (12, 7));
        assert_eq!((rendered.width(), rendered.height()), (12, 7));
    }

    #[test]
    fn jpeg_source_to_png_download() {
        let jpeg = render_bytes(&sample_png(5, 9), OutputFormat::Jpeg, at(1))
            .unwrap()
            .download
            .bytes;

        let rendered = render_bytes(&jpeg, OutputFormat::Png, at(2)).unwrap();
        assert_eq!(rendered.download.media_type, "image/png");
        assert_eq!(
            image::guess_format(&rendered.download.bytes).unwrap(),
            ImageFormat::Png
        );
        let roundtrip = image::load_from_memory(&rendered.download.bytes).unwrap();
        assert_eq!((roundtrip.width(), roundtrip.height()), (5, 9));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            render_bytes(b"definitely not an image", OutputFormat::Png, at(0)),
            Err(GenerationError::Decode(_))
        ));
    }

    #[test]
    fn saving_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = render_bytes(&sample_png(2, 2), OutputFormat::Png, at(5))
            .unwrap()
            .download;

        let first = artifact.save_into(dir.path()).unwrap();
        let second = artifact.save_into(dir.path()).unwrap();
        assert_eq!(first.file_name().unwrap(), "flux_image_5.png");
        assert_eq!(second.file_name().unwrap(), "flux_image_5_1.png");
        assert_eq!(fs::read(second).unwrap(), artifact.bytes);
    }

    #[tokio::test]
    async fn renders_first_image_only() {
        let server = TestServer::start().await;
        server.route(
            "GET",
            "/first.png",
            [Reply::bytes(200, "image/png", sample_png(4, 3))],
        );
        let result = JobResult::from_value(json!({
            "images": [{"url": server.url("/first.png")}, {"url": server.url("/second.png")}],
        }));

        let rendered = render(&Client::new(), &result, OutputFormat::Png, at(9))
            .await
            .unwrap();
        assert_eq!((rendered.width(), rendered.height()), (4, 3));

        let paths = server
            .requests()
            .into_iter()
            .map(|r| r.path)
            .collect::<Vec<_>>();
        assert_eq!(paths, ["/first.png"]);
    }

    #[tokio::test]
    async fn failed_fetch_is_a_network_error() {
        let server = TestServer::start().await;
        let result = JobResult::from_value(json!({"images": [{"url": server.url("/gone.png")}]}));

        let err = render(&Client::new(), &result, OutputFormat::Png, at(9))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Network(_)));
    }

    #[tokio::test]
    async fn empty_result_never_fetches() {
        let server = TestServer::start().await;
        let result = JobResult::from_value(json!({"images": [], "seed": 3}));

        let err = render(&Client::new(), &result, OutputFormat::Png, at(9))
            .await
            .unwrap_err();
        match err {
            GenerationError::EmptyResult { raw } => assert_eq!(raw["seed"], 3),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(server.requests().is_empty());
    }
}
