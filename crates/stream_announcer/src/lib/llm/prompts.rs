use crate::{
    llm::Prompt,
    types::{Direction, GenerationRequest},
};

const SYSTEM_START: &str = include_str!("./prompts/system_start.txt");
const SYSTEM_END: &str = include_str!("./prompts/system_end.txt");

/// Renders the backend prompt for `request`.
///
/// `content_max` and `hashtag_count` come from the budget allocator and the
/// guardrail config so that the backend is asked for exactly what the
/// validators will later enforce.
pub fn build_prompt(request: &GenerationRequest, content_max: usize, hashtag_count: usize) -> Prompt {
    let system = match request.direction {
        Direction::Start => SYSTEM_START,
        Direction::End => SYSTEM_END,
    };

    let event = match request.direction {
        Direction::Start => "just went live",
        Direction::End => "just ended their stream",
    };

    let hashtags = match hashtag_count {
        0 => "Do not use any hashtags.".to_string(),
        1 => "End the post with exactly 1 hashtag related to the stream topic.".to_string(),
        n => format!("End the post with exactly {n} hashtags related to the stream topic."),
    };

    let user = format!(
        "Streamer: {username}\n\
         Platform: {platform}\n\
         Event: {event}\n\
         Stream title: {title}\n\
         Posting to: {network}\n\n\
         Keep the post under {content_max} characters. {hashtags}",
        username = request.username,
        platform = request.platform_name,
        title = request.title.trim(),
        network = request.network,
    );

    Prompt {
        system: system.trim().to_string(),
        user,
    }
}
