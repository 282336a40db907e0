use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;

/// Decoder configuration, mirroring the WebCodecs `VideoDecoderConfig`/`AudioDecoderConfig`.
///
/// Travels as JSON inside loc packets, with the binary description base64 encoded.
///
/// Reference: <https://www.w3.org/TR/webcodecs/#video-decoder-config>
#[serde_with::serde_as]
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DecoderConfig {
	// The codec string, see https://w3c.github.io/webcodecs/codec_registry.html
	pub codec: String,

	// Codec specific initialization data, such as the avcC box.
	#[serde(default)]
	#[serde_as(as = "Option<Base64>")]
	pub description: Option<Bytes>,

	#[serde(default)]
	pub coded_width: Option<u32>,
	#[serde(default)]
	pub coded_height: Option<u32>,
	#[serde(default)]
	pub display_aspect_width: Option<u32>,
	#[serde(default)]
	pub display_aspect_height: Option<u32>,

	#[serde(default)]
	pub sample_rate: Option<u32>,
	#[serde(default)]
	pub number_of_channels: Option<u32>,

	#[serde(default)]
	pub optimize_for_latency: Option<bool>,
	#[serde(default)]
	pub hardware_acceleration: Option<String>,
}

impl DecoderConfig {
	pub fn to_json(&self) -> Result<Bytes, serde_json::Error> {
		Ok(serde_json::to_vec(self)?.into())
	}

	pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
		serde_json::from_slice(data)
	}
}
