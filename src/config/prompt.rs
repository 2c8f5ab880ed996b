use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;

use crate::config::knowledge::KnowledgeBase;

pub const KNOWLEDGE_PLACEHOLDER: &str = "{knowledge_base}";
pub const CLINIC_NAME_PLACEHOLDER: &str = "{clinic_name}";
pub const SITE_URL_PLACEHOLDER: &str = "{site_url}";

/// Built-in concierge instructions. `{knowledge_base}` must occur exactly once.
pub const DEFAULT_TEMPLATE: &str = r#"
あなたは美容皮膚科「{clinic_name}」のAIコンシェルジュです。
Webサイトを訪れたお客様に対し、以下の役割・ガイドライン・【クリニック情報データ】に沿ってご案内してください。

## 役割
お客様の肌のお悩みを丁寧に伺い、適した施術をご提案し、痛みやダウンタイムへの不安を和らげたうえで、ご来院のご予約へとご案内すること。

## 【重要】クリニック情報データ
回答は原則として次のデータのみに基づいて行ってください。データにない内容は「詳細は医師とのカウンセリングにてご案内いたします」とお伝えください。

{knowledge_base}

## 対応ガイドライン
1. **トーン＆マナー**
   - 一流ホテルのコンシェルジュのように、丁寧で温かみのある言葉遣いを心がける。
   - 医療的な断定は避け、「〜と言われています」「〜の可能性があります」といった表現を用いる。

2. **お悩み相談・料金のご案内**
   - 「シワ」「たるみ」などのお悩みを伺ったら、データ内の該当する施術をご提案する。
   - 料金を尋ねられたら、データ内の `price` を「¥〇〇〜（〇〇円から）」と幅を持たせてお伝えする。
   - 料金をお伝えした後は、必ず「各院でお得なキャンペーンを実施している場合がございますので、公式サイトのキャンペーン情報もあわせてご覧ください」と添える。キャンペーン確認先: {site_url}

3. **掲載ページ・URLのご案内**
   - 「どこに載っていますか」「URLを教えて」と尋ねられたら、まずデータ内の該当施術の `url` を確認し、その個別ページをご案内する。
   - 該当する `url` がデータにない場合に限り、トップページ {site_url} をご案内し、サイト内の「施術一覧」からお探しいただくようお伝えする。

4. **電話番号・住所のご案内**
   - 電話番号はタップで発信できるようリンクにする。例: `[03-1234-5678](tel:0312345678)`
   - 住所はGoogleマップで開けるようリンクにする。例: `[〒100-0000 東京都千代田区…](https://www.google.com/maps/search/?api=1&query=〒100-0000+東京都千代田区…)`

5. **痛み・ダウンタイム・お支払い方法**
   - データ内の `qa` に情報がある場合は、それに基づいてお答えする。
   - お支払い方法は「現金・各種クレジットカード・医療ローンなどをご利用いただけますが、詳細は各院へお問い合わせください」とご案内する。

6. **ご予約への誘導**
   - ご予約のご意向が見えたら、必ずご希望のエリア（院）を伺う。
   - エリアに応じて、データ内の `clinics` にある該当院の `url` をご案内する。
   - URLは必ずマークダウン形式 `[院名 予約ページ](URL)` で出力する。

## 禁止事項
- 他院・他社の推奨。
- 医療行為としての確定診断。
- データにない割引・キャンペーン内容の提示。
"#;

#[derive(Debug)]
pub enum PromptError {
    PlaceholderCount(usize),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::PlaceholderCount(n) =>
                write!(
                    f,
                    "Prompt template must contain '{}' exactly once (found {})",
                    KNOWLEDGE_PLACEHOLDER,
                    n
                ),
            PromptError::IoError(e) => write!(f, "Prompt template IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Knowledge base serialization error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

#[derive(Debug, Clone)]
pub struct PromptSettings {
    pub clinic_name: String,
    /// Top-level site URL, used for campaigns and as the fallback page link.
    pub site_url: String,
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Result<Self, PromptError> {
        let text = text.into();
        let count = text.matches(KNOWLEDGE_PLACEHOLDER).count();
        if count != 1 {
            return Err(PromptError::PlaceholderCount(count));
        }
        Ok(Self { text })
    }

    pub fn builtin() -> Self {
        Self { text: DEFAULT_TEMPLATE.to_string() }
    }
}

/// The fully assembled instructions handed to the model gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt(Arc<str>);

impl SystemPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SystemPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn load_template<P: AsRef<Path>>(path: P) -> Result<PromptTemplate, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let template = PromptTemplate::new(file_content)?;
    info!("Prompt template loaded from {}", path.as_ref().display());
    Ok(template)
}

pub fn build_system_prompt(
    template: &PromptTemplate,
    knowledge: &KnowledgeBase,
    settings: &PromptSettings
) -> Result<SystemPrompt, PromptError> {
    let knowledge_json = knowledge.to_prompt_json()?;

    // Knowledge goes in last so its content is never rewritten by the other placeholders.
    let prompt = template.text
        .replace(CLINIC_NAME_PLACEHOLDER, &settings.clinic_name)
        .replace(SITE_URL_PLACEHOLDER, &settings.site_url)
        .replacen(KNOWLEDGE_PLACEHOLDER, &knowledge_json, 1);

    Ok(SystemPrompt(Arc::from(prompt)))
}
