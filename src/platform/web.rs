//! Browser collaborators: webcam, PoseNet and canvas overlay
//!
//! Pose estimation in the browser is asynchronous, so the shell awaits
//! `estimate` and pushes the result into a `PoseFeed`. The camera and model
//! handed to `DetectionLoop` then read from that feed synchronously.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::{FrameSource, PoseModel, Presenter};
use crate::error::{GameError, Result};
use crate::game::{Pose, SessionSnapshot};
use crate::settings::{DetectionMode, ModelSettings, Settings};

#[wasm_bindgen(inline_js = "
    let video = null;
    let net = null;

    export function setup_camera(width, height) {
        return (async () => {
            if (!navigator.mediaDevices || !navigator.mediaDevices.getUserMedia) {
                throw new Error('getUserMedia is not available');
            }
            video = document.getElementById('video');
            video.width = width;
            video.height = height;
            video.srcObject = await navigator.mediaDevices.getUserMedia({
                audio: false,
                video: { facingMode: 'user', width: width, height: height },
            });
            await new Promise((resolve) => { video.onloadedmetadata = resolve; });
            await video.play();
        })();
    }

    export function load_model(architecture) {
        return (async () => {
            net = await posenet.load(architecture);
        })();
    }

    export function estimate_poses(multi, maxPoses, flip, scale, stride, minPart, nms) {
        return (async () => {
            const poses = multi
                ? await net.estimateMultiplePoses(video, scale, flip, stride, maxPoses, minPart, nms)
                : [await net.estimateSinglePose(video, scale, flip, stride)];
            return JSON.stringify(poses);
        })();
    }

    export function draw_frame(posesJson, minPart, flip, bubbleX, bubbleY, hasBubble) {
        const canvas = document.getElementById('output');
        if (!canvas || !video) return;
        const ctx = canvas.getContext('2d');
        ctx.clearRect(0, 0, canvas.width, canvas.height);
        ctx.save();
        if (flip) {
            ctx.scale(-1, 1);
            ctx.translate(-canvas.width, 0);
        }
        ctx.drawImage(video, 0, 0, canvas.width, canvas.height);
        ctx.restore();

        for (const pose of JSON.parse(posesJson)) {
            for (const kp of pose.keypoints) {
                if (kp.score < minPart) continue;
                ctx.beginPath();
                ctx.arc(kp.position.x, kp.position.y, 4, 0, 2 * Math.PI);
                ctx.fillStyle = 'aqua';
                ctx.fill();
            }
            for (const [a, b] of posenet.getAdjacentKeyPoints(pose.keypoints, minPart)) {
                ctx.beginPath();
                ctx.moveTo(a.position.x, a.position.y);
                ctx.lineTo(b.position.x, b.position.y);
                ctx.lineWidth = 2;
                ctx.strokeStyle = 'aqua';
                ctx.stroke();
            }
        }

        const bubble = document.getElementById('bubble');
        if (bubble) {
            bubble.style.display = hasBubble ? 'block' : 'none';
            bubble.style.left = bubbleX + 'px';
            bubble.style.top = bubbleY + 'px';
        }
    }
")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn setup_camera(width: u32, height: u32) -> std::result::Result<js_sys::Promise, JsValue>;
    #[wasm_bindgen(catch)]
    fn load_model(architecture: f32) -> std::result::Result<js_sys::Promise, JsValue>;
    #[wasm_bindgen(catch)]
    fn estimate_poses(
        multi: bool,
        max_poses: usize,
        flip: bool,
        scale: f32,
        stride: u32,
        min_part: f32,
        nms: f32,
    ) -> std::result::Result<js_sys::Promise, JsValue>;
    fn draw_frame(poses_json: &str, min_part: f32, flip: bool, bubble_x: f32, bubble_y: f32, has_bubble: bool);
}

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

/// Read a JSON value stored under `key`; absent or unparsable is `None`
pub fn load_local<T: DeserializeOwned>(key: &str) -> Option<T> {
    let json = local_storage()?.get_item(key).ok().flatten()?;
    match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring stored {}: {}", key, e);
            None
        }
    }
}

/// Store `value` as JSON under `key`. Returns whether it was written.
pub fn save_local<T: Serialize>(key: &str, value: &T) -> bool {
    let Some(storage) = local_storage() else {
        return false;
    };
    match serde_json::to_string(value) {
        Ok(json) => storage.set_item(key, &json).is_ok(),
        Err(e) => {
            log::warn!("Cannot serialize {}: {}", key, e);
            false
        }
    }
}

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

async fn await_promise(promise: std::result::Result<js_sys::Promise, JsValue>) -> std::result::Result<JsValue, String> {
    let promise = promise.map_err(|e| js_message(&e))?;
    JsFuture::from(promise).await.map_err(|e| js_message(&e))
}

#[derive(Debug, Default)]
struct FeedState {
    camera_ready: bool,
    model_ready: bool,
    latest: Option<Vec<Pose>>,
}

/// Shared slot between the async estimator and the detection loop
#[derive(Debug, Clone, Default)]
pub struct PoseFeed {
    state: Rc<RefCell<FeedState>>,
}

impl PoseFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for webcam access and wait for the first frame
    pub async fn open_camera(&self, settings: &Settings) -> Result<()> {
        await_promise(setup_camera(settings.video_width, settings.video_height))
            .await
            .map_err(GameError::CameraUnavailable)?;
        self.state.borrow_mut().camera_ready = true;
        log::info!("Webcam ready ({}x{})", settings.video_width, settings.video_height);
        Ok(())
    }

    pub async fn load_model(&self, model: &ModelSettings) -> Result<()> {
        await_promise(load_model(model.architecture))
            .await
            .map_err(GameError::ModelUnavailable)?;
        self.state.borrow_mut().model_ready = true;
        log::info!("PoseNet loaded (architecture {})", model.architecture);
        Ok(())
    }

    /// Run one estimate on the current video frame and park the result
    pub async fn estimate(&self, mode: DetectionMode, model: &ModelSettings) -> Result<()> {
        let value = await_promise(estimate_poses(
            mode == DetectionMode::MultiPose,
            model.max_pose_detections,
            model.flip_horizontal,
            model.image_scale_factor,
            model.output_stride,
            model.min_part_confidence,
            model.nms_radius,
        ))
        .await
        .map_err(GameError::DetectionFrameFailed)?;

        let json = value
            .as_string()
            .ok_or_else(|| GameError::DetectionFrameFailed("estimate returned no JSON".into()))?;
        let poses: Vec<Pose> =
            serde_json::from_str(&json).map_err(|e| GameError::MalformedPose(e.to_string()))?;
        self.state.borrow_mut().latest = Some(poses);
        Ok(())
    }

    pub fn camera(&self) -> WebCamera {
        WebCamera { feed: self.clone() }
    }

    pub fn model(&self) -> WebPoseModel {
        WebPoseModel { feed: self.clone() }
    }
}

/// Frame source yielding the latest parked estimate
pub struct WebCamera {
    feed: PoseFeed,
}

impl FrameSource for WebCamera {
    type Frame = Vec<Pose>;

    fn start(&mut self) -> Result<()> {
        if self.feed.state.borrow().camera_ready {
            Ok(())
        } else {
            Err(GameError::CameraUnavailable("webcam not set up".into()))
        }
    }

    fn next_frame(&mut self) -> Result<Vec<Pose>> {
        self.feed
            .state
            .borrow_mut()
            .latest
            .take()
            .ok_or_else(|| GameError::DetectionFrameFailed("no estimate ready".into()))
    }
}

/// The browser model already ran; this only picks poses out of the frame
pub struct WebPoseModel {
    feed: PoseFeed,
}

impl PoseModel<Vec<Pose>> for WebPoseModel {
    fn load(&mut self) -> Result<()> {
        if self.feed.state.borrow().model_ready {
            Ok(())
        } else {
            Err(GameError::ModelUnavailable("PoseNet not loaded".into()))
        }
    }

    fn estimate_single_pose(&mut self, frame: &Vec<Pose>) -> Result<Pose> {
        frame
            .first()
            .cloned()
            .ok_or_else(|| GameError::DetectionFrameFailed("no pose in frame".into()))
    }

    fn estimate_multiple_poses(&mut self, frame: &Vec<Pose>, max_poses: usize) -> Result<Vec<Pose>> {
        Ok(frame.iter().take(max_poses).cloned().collect())
    }
}

/// Draws the video, skeletons and the bubble; updates the HUD score
pub struct CanvasPresenter {
    min_part_confidence: f32,
    flip: bool,
    last_score: Option<u64>,
}

impl CanvasPresenter {
    pub fn new(model: &ModelSettings) -> Self {
        Self {
            min_part_confidence: model.min_part_confidence,
            flip: model.flip_horizontal,
            last_score: None,
        }
    }
}

impl Presenter for CanvasPresenter {
    fn present(&mut self, poses: &[Pose], view: &SessionSnapshot) {
        let json = match serde_json::to_string(poses) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Cannot serialize poses: {}", e);
                return;
            }
        };
        let bubble = view.target.map(|t| t.target.bubble);
        draw_frame(
            &json,
            self.min_part_confidence,
            self.flip,
            bubble.map(|b| b.x).unwrap_or_default(),
            bubble.map(|b| b.y).unwrap_or_default(),
            bubble.is_some(),
        );

        if self.last_score != Some(view.score) {
            self.last_score = Some(view.score);
            let el = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|d| d.query_selector("#hud-score .hud-value").ok().flatten());
            if let Some(el) = el {
                el.set_text_content(Some(&view.score.to_string()));
            }
        }
    }
}
