//! Text sent to the client: system chat lines and play-phase disconnects.

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use crate::protocol::Encode;
use crate::protocol::buffer::WriteExt;
use crate::protocol::version::ProtocolVersion::{self, *};

/// Plain JSON text component
pub fn text_component(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

/// Chat position / chat type used for server messages
const SYSTEM_POSITION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemChat {
    pub json: String,
}

impl SystemChat {
    pub fn text(text: &str) -> Self {
        Self {
            json: text_component(text),
        }
    }
}

impl Encode for SystemChat {
    fn encode(&self, buf: &mut BytesMut, version: ProtocolVersion) {
        buf.put_string(&self.json);
        if version >= V1_19_1 {
            // not an action bar overlay
            buf.put_bool(false);
        } else if version >= V1_19 {
            buf.put_var_int(SYSTEM_POSITION as i32);
        } else if version >= V1_8 {
            buf.put_u8(SYSTEM_POSITION);
            if version >= V1_16 {
                buf.put_uuid(Uuid::nil());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub json: String,
}

impl Disconnect {
    pub fn text(text: &str) -> Self {
        Self {
            json: text_component(text),
        }
    }
}

impl Encode for Disconnect {
    fn encode(&self, buf: &mut BytesMut, _version: ProtocolVersion) {
        buf.put_string(&self.json);
    }
}
