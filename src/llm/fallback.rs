//! Canned greeting served when the LLM cannot answer.

/// Detects Arabic script (base block, supplement, extended-A, and the
/// presentation forms).
#[must_use]
pub fn contains_arabic(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}')
    })
}

/// Greeting in the customer's script: Arabic if their message contains any
/// Arabic characters, English otherwise.
#[must_use]
pub fn fallback_greeting(customer_message: &str, bot_name: &str, business_name: &str) -> String {
    if contains_arabic(customer_message) {
        format!(
            "مرحباً! أنا {bot_name}، المساعد الخاص بـ {business_name}. \
             نواجه صعوبة مؤقتة في الرد الآن، يرجى المحاولة مرة أخرى بعد قليل."
        )
    } else {
        format!(
            "Hello! I'm {bot_name}, the assistant for {business_name}. \
             I'm having trouble answering right now, please try again in a moment."
        )
    }
}
