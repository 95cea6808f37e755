/// A message embed, shaped like the Discord REST payload.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct Footer {
    pub text: String,
}

impl Embed {
    pub fn new(title: impl ToString) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_field(mut self, name: impl ToString, value: impl ToString) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            value: value.to_string(),
            inline: false,
        });
        self
    }

    pub fn with_footer(mut self, text: impl ToString) -> Self {
        self.footer = Some(Footer {
            text: text.to_string(),
        });
        self
    }
}
