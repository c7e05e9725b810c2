//! 图片提取模块
//!
//! # 设计思路
//!
//! 剪贴板图片的来源五花八门，同一张截图可能同时以 PNG 流、原生位图、
//! DIB 和通用位图的形式存在，而且任何一种都可能是残缺的。
//! 提取器按固定优先级尝试各个策略，第一个成功的结果即被采用：
//!
//! 1. `DirectStream`：PNG 数据流原样写盘，保真度最高
//! 2. `NativeBitmap`：平台原生位图直接编码
//! 3. `DeviceIndependentBitmap`：解码 DIB（字节或需要回绕的流）后编码
//! 4. `GenericReencode`：通用位图归一化为 32 位后编码
//! 5. `DrawThrough`：通用位图绘制到全新 32 位画布后编码，容忍残缺缓冲
//!
//! # 实现思路
//!
//! - 策略是一个带标签的枚举，统一签名 `(payload) -> Result<CapturedImage, ExtractionFailure>`，
//!   不需要动态分发。
//! - 单个策略的错误只记录并继续，全部失败才返回 `AllStrategiesFailed`。
//! - 提取前做一次透明度采样，几乎全透明时只告警，不阻止保存。

pub mod dib;
mod error;
mod extractor;
pub mod raster;
mod strategy;

pub use error::ExtractionFailure;
pub use extractor::{CapturedImage, ImageExtractor};
pub use raster::{OpacityReport, PixelFormat, RasterImage};
pub use strategy::Strategy;
