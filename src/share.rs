use serde::Serialize;

use crate::celebrity::encode_component;
use crate::types::PersonalColorAnalysis;

/// Link bundle the front end hands to the platform share capabilities.
/// Building the URLs here keeps the encoding rules in one place; firing
/// them (share sheet, download, clipboard) stays with the browser.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinks {
    pub caption: String,
    pub twitter_url: String,
    pub mailto_url: String,
}

pub fn share_caption(analysis: &PersonalColorAnalysis) -> String {
    format!(
        "I found my personal color: {}! My K-celeb match is {}. Find your colors!",
        analysis.season, analysis.korean_celebrity.name
    )
}

pub fn tweet_intent_url(caption: &str, app_url: &str) -> String {
    format!(
        "https://twitter.com/intent/tweet?text={}&url={}",
        encode_component(caption),
        encode_component(app_url)
    )
}

pub fn mailto_url(caption: &str, app_url: &str) -> String {
    let subject = encode_component("My K-Beauty Color Analysis");
    let body = encode_component(&format!(
        "{}\n\nCheck out the Korean Glow-Up app:\n{}",
        caption, app_url
    ));
    format!("mailto:?subject={}&body={}", subject, body)
}

pub fn share_links(analysis: &PersonalColorAnalysis, app_url: &str) -> ShareLinks {
    let caption = share_caption(analysis);
    ShareLinks {
        twitter_url: tweet_intent_url(&caption, app_url),
        mailto_url: mailto_url(&caption, app_url),
        caption,
    }
}
