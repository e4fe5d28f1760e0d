//! HTML bodies of every outgoing email. Pure functions: every dynamic value is escaped here.

use std::fmt::Write;

use crate::{
    dao::models::Difficulty,
    services::question_generator::{GeneratedQuestion, MathConcept, NewsItem},
};

/// Data shown in an invitation email.
pub struct InvitationDetails<'a> {
    pub host_username: &'a str,
    pub invite_code: &'a str,
    pub max_questions: u32,
    pub difficulty: Difficulty,
    pub topic: &'a str,
    pub site_url: &'a str,
}

/// One leaderboard line of the post-game email.
pub struct ResultLine<'a> {
    pub username: &'a str,
    pub score: i64,
}

/// Feedback forwarded to the operator mailbox.
pub struct FeedbackDetails<'a> {
    pub message: &'a str,
    pub category: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub submitted_at: &'a str,
}

/// Escape text for inclusion in HTML bodies and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn rank_label(index: usize) -> String {
    match index {
        0 => "🥇 1st".into(),
        1 => "🥈 2nd".into(),
        2 => "🥉 3rd".into(),
        _ => format!("{}th", index + 1),
    }
}

fn rank_color(index: usize) -> &'static str {
    match index {
        0 => "#ffd700",
        1 => "#c0c0c0",
        2 => "#cd7f32",
        _ => "#6c757d",
    }
}

fn option_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

pub fn invitation_subject() -> String {
    "🎮 You're invited to play MathRush!".into()
}

pub fn render_invitation(details: &InvitationDetails<'_>) -> String {
    let host = escape_html(details.host_username);
    let code = escape_html(details.invite_code);
    let topic = escape_html(details.topic);
    let url = escape_html(details.site_url);
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h1>🎮 You're Invited!</h1>
<p>Join {host}'s MathRush Game</p>
<h2>Game Details</h2>
<div><strong>📊 Questions:</strong> {questions}</div>
<div><strong>🎯 Difficulty:</strong> {difficulty}</div>
<div><strong>📚 Topics:</strong> {topic}</div>
<h3>Your Invite Code</h3>
<div style="font-size: 32px; font-weight: bold; letter-spacing: 4px; font-family: monospace;">{code}</div>
<ol>
<li>Open <a href="{url}">{url}</a> and sign in</li>
<li>Enter the invite code: <strong>{code}</strong></li>
</ol>
</div>"#,
        questions = details.max_questions,
        difficulty = details.difficulty.as_str(),
    )
}

pub fn results_subject(score: i64) -> String {
    format!("🎯 Your MathRush quiz Results - Score: {score}")
}

pub fn render_game_results(lines: &[ResultLine<'_>]) -> String {
    let mut rows = String::new();
    for (index, line) in lines.iter().enumerate() {
        let _ = write!(
            rows,
            r#"<tr><td style="font-weight: bold; color: {color};">{rank}</td><td>{username}</td><td style="text-align: center;">{score}</td></tr>"#,
            color = rank_color(index),
            rank = rank_label(index),
            username = escape_html(line.username),
            score = line.score,
        );
    }

    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
<h2>🏆 Game Leaderboard</h2>
<table style="width: 100%; border-collapse: collapse;">
<thead><tr><th>Rank</th><th>Username</th><th>Score</th></tr></thead>
<tbody>{rows}</tbody>
</table>
<p>Keep playing to climb the leaderboard!</p>
</div>"#
    )
}

pub fn daily_subject(date: &str) -> String {
    format!("🧮 Daily Math Challenge - {date}")
}

pub fn render_daily_question(question: &GeneratedQuestion) -> String {
    let mut options = String::new();
    for (index, option) in question.options.iter().enumerate() {
        let _ = write!(
            options,
            "<div><strong>{}.</strong> {}</div>",
            option_letter(index),
            escape_html(option)
        );
    }

    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h1>🧮 Daily Math Challenge</h1>
<p>Ready for today's brain teaser?</p>
<h2>Today's Question</h2>
<p style="font-size: 18px; font-weight: bold;">{text}</p>
{options}
<h4>💡 Explanation</h4>
<p>Correct Answer: {answer}</p>
<p>{explanation}</p>
<p>Challenge your friends and keep learning! 🌟</p>
</div>"#,
        text = escape_html(&question.question),
        answer = option_letter(question.correct_answer as usize),
        explanation = escape_html(&question.explanation),
    )
}

pub fn weekly_subject(date: &str) -> String {
    format!("🧮 Weekly Digest - {date}")
}

pub fn render_weekly_digest(
    week_label: &str,
    news: &[NewsItem],
    concept: &MathConcept,
    site_url: &str,
) -> String {
    let mut headlines = String::new();
    for item in news {
        let _ = write!(
            headlines,
            r#"<div style="border-left: 4px solid #667eea; padding: 12px; margin-bottom: 12px;"><a href="{url}"><div style="font-weight: 600;">{title}</div><div>{summary}</div></a></div>"#,
            url = escape_html(&item.url),
            title = escape_html(&item.title),
            summary = escape_html(&item.summary),
        );
    }

    let links = concept
        .learn_more_links
        .iter()
        .map(|link| {
            format!(
                r#"<a href="{}">{}</a>"#,
                escape_html(&link.url),
                escape_html(&link.text)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"<div style="font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto;">
<h1>MathRush Weekly Digest</h1>
<p>Your curated dose of news and knowledge</p>
<div>{week}</div>
<h2>🌟 Top News This Week</h2>
{headlines}
<h2>🧮 Math Concept of the Week</h2>
<div style="font-weight: 600;">{title}</div>
<div>{description}</div>
<h4>Learn More:</h4>
{links}
<p><a href="{site}">Sign in</a> to keep practising.</p>
</div>"#,
        week = escape_html(week_label),
        title = escape_html(&concept.title),
        description = escape_html(&concept.description),
        site = escape_html(site_url),
    )
}

pub fn feedback_subject(username: &str) -> String {
    format!("Feedback from {username}")
}

pub fn render_feedback(details: &FeedbackDetails<'_>) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h1>🧮 MathRush</h1>
<p>User Feedback</p>
<div style="background: #f8f9ff; padding: 20px; border-radius: 10px;">
<p style="white-space: pre-wrap;">{message}</p>
<p><strong>Feedback Category:</strong> {category}</p>
</div>
<p>Submitted by:</p>
<div style="background: #f8f9ff; padding: 20px; border-radius: 10px;">
<p><strong>Username:</strong> {username}</p>
<p><strong>Email:</strong> {email}</p>
<p><strong>Date:</strong> {submitted_at}</p>
</div>
</div>"#,
        message = escape_html(details.message),
        category = escape_html(details.category),
        username = escape_html(details.username),
        email = escape_html(details.email),
        submitted_at = escape_html(details.submitted_at),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::question_generator::{fallback_math_concept, fallback_question};

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn results_rank_players_in_given_order() {
        let html = render_game_results(&[
            ResultLine {
                username: "<script>",
                score: 15,
            },
            ResultLine {
                username: "bob",
                score: -5,
            },
        ]);
        assert!(html.contains("🥇 1st"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.find("&lt;script&gt;") < html.find("bob"));
    }

    #[test]
    fn invitation_carries_the_code() {
        let html = render_invitation(&InvitationDetails {
            host_username: "alice",
            invite_code: "AB12CD",
            max_questions: 5,
            difficulty: Difficulty::Easy,
            topic: "addition",
            site_url: "https://mathrush.online",
        });
        assert!(html.contains("AB12CD"));
        assert!(html.contains("alice's MathRush Game"));
    }

    #[test]
    fn feedback_escapes_player_text() {
        let html = render_feedback(&FeedbackDetails {
            message: "<img src=x onerror=alert(1)>",
            category: "Bug Report",
            username: "ada",
            email: "ada@example.com",
            submitted_at: "2026-01-05T10:00:00Z",
        });
        assert!(html.contains("&lt;img"));
        assert!(!html.contains("<img"));
        assert!(html.contains("Bug Report"));
    }

    #[test]
    fn daily_question_reveals_answer_letter() {
        let html = render_daily_question(&fallback_question(Difficulty::Medium, "algebra"));
        assert!(html.contains("Correct Answer: C"));
    }

    #[test]
    fn digest_lists_concept_links() {
        let html = render_weekly_digest("Week of June 1, 2025", &[], &fallback_math_concept(), "https://x");
        assert!(html.contains("Modular Arithmetic"));
        assert_eq!(html.matches("<a href=").count(), 4);
    }
}
