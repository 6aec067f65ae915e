//! What a workload hands back to the transport: an optional content type
//! and a body. Status, framing and headers belong to the server.

#[derive(Debug)]
pub struct Reply {
    content_type: Option<&'static str>,
    body: Vec<u8>,
}

impl Reply {
    pub fn new() -> Self {
        Self {
            content_type: None,
            body: Vec::with_capacity(256),
        }
    }

    pub fn reset(&mut self) {
        self.content_type = None;
        self.body.clear();
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    pub fn set_content_type(&mut self, content_type: &'static str) {
        self.content_type = Some(content_type);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    pub fn into_parts(self) -> (Option<&'static str>, Vec<u8>) {
        (self.content_type, self.body)
    }
}

impl Default for Reply {
    fn default() -> Self {
        Self::new()
    }
}
