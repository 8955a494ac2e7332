use jewelry_enhance::config::Config;
use jewelry_enhance::logger;
use jewelry_enhance::models::{Angle, Background, ImageData, Material, OutputFormat, RecordStatus, StyleOptions};
use jewelry_enhance::orchestrator::{BatchScheduler, Enhancer, Progress, Session};
use jewelry_enhance::services::export::export_bundle;
use jewelry_enhance::services::generation::{GenerationError, GenerationResponse, ImageGenerator};
use jewelry_enhance::services::{GeminiGenerator, JsonFileStore, LikedSet, MemoryStore, SubjectClassifier};
use jewelry_enhance::workflow::retry::RATE_LIMIT_MESSAGE;
use jewelry_enhance::workflow::{RetryHarness, RetryPolicy, TitleClassifier};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn tiny_png() -> ImageData {
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([212, 175, 55]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    ImageData::new("image/png", bytes)
}

/// 总是返回同一张 PNG
#[derive(Default)]
struct StudioGenerator {
    calls: AtomicUsize,
}

impl ImageGenerator for StudioGenerator {
    async fn generate(
        &self,
        _image: &ImageData,
        _prompt: &str,
    ) -> Result<GenerationResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GenerationResponse {
            images: vec![tiny_png()],
            text: None,
        })
    }
}

/// 总是被限流
struct ThrottledGenerator;

impl ImageGenerator for ThrottledGenerator {
    async fn generate(
        &self,
        _image: &ImageData,
        _prompt: &str,
    ) -> Result<GenerationResponse, GenerationError> {
        Err(GenerationError::Http {
            status: 429,
            body: "RESOURCE_EXHAUSTED".into(),
        })
    }
}

struct RingClassifier;

impl SubjectClassifier for RingClassifier {
    async fn classify(&self, _image: &ImageData, _instruction: &str) -> anyhow::Result<String> {
        Ok("Diamond Ring.".to_string())
    }
}

fn enhancer<G: ImageGenerator>(generator: G, format: OutputFormat) -> Enhancer<G, RingClassifier> {
    let policy = RetryPolicy::default();
    Enhancer::with_parts(
        RetryHarness::new(generator, policy),
        TitleClassifier::new(RingClassifier, policy),
        BatchScheduler::default(),
        format,
    )
}

#[tokio::test(start_paused = true)]
async fn test_auto_enhance_like_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let liked_path = dir.path().join("liked.json");

    let generator = Arc::new(StudioGenerator::default());
    let enhancer = enhancer(generator.clone(), OutputFormat::Png);
    let mut session = Session::new(LikedSet::load(Box::new(JsonFileStore::new(&liked_path))));

    let first = enhancer.import(&mut session, tiny_png()).await;
    enhancer.import(&mut session, tiny_png()).await;
    assert_eq!(session.record(&first).unwrap().title, "Diamond Ring");

    let mut updates: Vec<Progress> = Vec::new();
    let summary = enhancer
        .auto_enhance(&mut session, |p| updates.push(p))
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates.last().unwrap().completed, 2);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.unenhanced_count(), 0);

    // 收藏一张结果，并在新会话里读回
    let result_id = session.derived_of(&first).next().unwrap().id.clone();
    assert!(session.toggle_like(&result_id).unwrap());
    let reloaded = LikedSet::load(Box::new(JsonFileStore::new(&liked_path)));
    assert!(reloaded.contains(&result_id));

    let selected = session.selected_results();
    assert_eq!(selected.len(), 2);
    let archive = export_bundle(&selected, &dir.path().join("export"), "jewelry")
        .await
        .unwrap();
    assert!(archive.ends_with("jewelry.zip"));
    let mut zip = zip::ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
    assert_eq!(zip.len(), 2);
    assert_eq!(zip.by_index(0).unwrap().name(), "jewelry_1.png");
    assert_eq!(zip.by_index(1).unwrap().name(), "jewelry_2.png");

    // 删除整组后收藏快照仍然存在
    session.remove_group(&first);
    assert_eq!(session.liked_records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_custom_enhance_reencodes_to_jpeg() {
    let enhancer = enhancer(StudioGenerator::default(), OutputFormat::Jpeg);
    let mut session = Session::new(LikedSet::load(Box::new(MemoryStore::default())));
    let source = enhancer.import(&mut session, tiny_png()).await;

    let style = StyleOptions {
        background: Background::Velvet,
        material: Material::Gold,
        ..Default::default()
    };
    enhancer
        .custom_enhance(
            &mut session,
            &style,
            &[Angle::Front, Angle::ThreeQuarter, Angle::CloseUp],
            |_| {},
        )
        .await
        .unwrap();

    let results: Vec<_> = session.derived_of(&source).collect();
    assert_eq!(results.len(), 3);
    for record in &results {
        assert_eq!(record.status, RecordStatus::Succeeded);
        assert_eq!(record.result_image.as_ref().unwrap().mime_type, "image/jpeg");
        // 所有角度都从原图生成
        assert_eq!(record.raw_image, session.record(&source).unwrap().raw_image);
    }
    assert_eq!(results[1].title, "Diamond Ring · 3/4 View");
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_run_marks_records_failed() {
    let enhancer = enhancer(ThrottledGenerator, OutputFormat::Jpeg);
    let mut session = Session::new(LikedSet::load(Box::new(MemoryStore::default())));
    let source = enhancer.import(&mut session, tiny_png()).await;

    let summary = enhancer.auto_enhance(&mut session, |_| {}).await.unwrap();
    assert_eq!(summary.failed, 1);

    let record = session.derived_of(&source).next().unwrap();
    assert_eq!(record.status, RecordStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some(RATE_LIMIT_MESSAGE));
    assert!(session.selected_results().is_empty());
    assert!(!session.can_enhance());
}

/// 真实生成接口测试
///
/// 运行方式：
/// ```bash
/// GENERATION_API_KEY=... cargo test test_generate_live -- --ignored --nocapture
/// ```
#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_generate_live() {
    // 初始化日志
    logger::init(true);

    // 加载配置
    let config = Config::from_env().unwrap();

    let generator = GeminiGenerator::new(&config);
    let response = generator
        .generate(&tiny_png(), "Place this gold swatch on white marble. Output a single photorealistic image.")
        .await
        .expect("生成接口调用失败");

    println!("返回图片数: {}", response.images.len());
    assert!(!response.images.is_empty() || response.text.is_some());
}
