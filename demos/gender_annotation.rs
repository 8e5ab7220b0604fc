use anyhow::Context;
use log::LevelFilter;
use rs_face_gender_tflite::face_gender_lite::face_gender::{process_image, FaceDetector, PipelineOptions};
use rs_face_gender_tflite::face_gender_lite::gender_model::GenderModel;
use rs_face_gender_tflite::face_gender_lite::render::annotate;
use rs_face_gender_tflite::face_gender_lite::types::BoundingBox;
use rs_face_gender_tflite::face_gender_lite::utils::{decode_image, init_logging};
use rs_face_gender_tflite::face_gender_lite::EncoderOptions;
use image::RgbaImage;

/// Face boxes given on the command line as `left,top,right,bottom`.
struct ArgBoxes(Vec<BoundingBox>);

impl FaceDetector for ArgBoxes {
    fn detect(&self, _image: &RgbaImage) -> anyhow::Result<Vec<BoundingBox>> {
        Ok(self.0.clone())
    }
}

fn parse_box(arg: &str) -> anyhow::Result<BoundingBox> {
    let values = arg
        .split(',')
        .map(|v| v.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid box '{}'", arg))?;
    match values.as_slice() {
        [left, top, right, bottom] => Ok(BoundingBox::new(*left, *top, *right, *bottom)),
        _ => anyhow::bail!("box '{}' must be left,top,right,bottom", arg),
    }
}

fn main() -> anyhow::Result<()> {
    init_logging(LevelFilter::Info);

    let mut args = std::env::args().skip(1);
    let image_path = args
        .next()
        .context("usage: gender_annotation <image> <model.tflite> [left,top,right,bottom ...]")?;
    let model_path = args.next().context("missing model path")?;
    let boxes = args.map(|a| parse_box(&a)).collect::<anyhow::Result<Vec<_>>>()?;

    let im_bytes = std::fs::read(&image_path).with_context(|| format!("failed to read {}", image_path))?;
    let image = decode_image(&im_bytes)?;

    let config = EncoderOptions::default().build()?;
    let model = GenderModel::new(Some(model_path))?;
    let options = PipelineOptions {
        resize_fallback: true,
        ..Default::default()
    };

    let results = process_image(&image, &config, &options, &ArgBoxes(boxes), &model)?;
    let reports: Vec<_> = results.iter().filter_map(|r| r.report()).collect();
    println!("{}", serde_json::to_string_pretty(&reports)?);

    let tagged = annotate(&image, &results);
    tagged.save("./tagged.png").context("failed to save tagged image")?;
    Ok(())
}
