//! Scripted copy for the campaign dialogue

use super::state::DonorField;

pub const WELCOME: &str =
    "Welcome to Tom Emmer's campaign chatbot! How can I assist you today?";
pub const MENU_PROMPT: &str = "Please select an option:";
pub const UNKNOWN_OPTION: &str = "I'm sorry, I didn't understand that option. Please try again.";
pub const UNHANDLED_INPUT: &str = "I'm not sure how to handle that. Can you please try again?";

pub const DONATE_START: &str = "Great! Let's start the donation process. What's your first name?";
pub const VOLUNTEER_INSTRUCTIONS: &str = "Thank you for your interest in volunteering! Please provide your name, email, and how you'd like to help.";
pub const CONTACT_INSTRUCTIONS: &str = "To get in touch with the campaign, please provide your name, email, and message. We'll get back to you as soon as possible.";
pub const INQUIRY_INVITATION: &str = "Sure, I'd be happy to help with any general inquiries. What would you like to know about Tom Emmer's campaign?";

pub const SUMMARY_INTRO: &str =
    "Great! Here's a summary of the information you provided. Is this correct?";
pub const CONFIRM_YES: &str = "Yes";
pub const CONFIRM_NO: &str = "Information is Incorrect";

pub const LINK_INTRO: &str = "Perfect! Here's your personalized donation link:";
pub const LINK_THANKS: &str =
    "Click the link above to complete your donation. Thank you for your support!";
pub const RESTART_DONATION: &str = "I understand. Let's start over. What's your first name?";

pub const COMPLETION_FAILED: &str = "Sorry, I couldn't reach the campaign assistant just now. Please try again or contact the campaign directly.";

/// Prompt asked after `field` has been stored; `None` once the zip is in
pub fn prompt_after(field: DonorField) -> Option<&'static str> {
    match field {
        DonorField::FirstName => Some("Thank you! Now, what's your last name?"),
        DonorField::LastName => Some("Got it. What's your email address?"),
        DonorField::Email => Some("Thanks. What's your street address?"),
        DonorField::Address => Some("Great. What city do you live in?"),
        DonorField::City => {
            Some("And what state is that in? (Please use the two-letter abbreviation)")
        }
        DonorField::State => Some("Almost done! What's your ZIP code?"),
        DonorField::Zip => None,
    }
}

/// Entries of the option menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    Donate,
    Volunteer,
    Contact,
    GeneralInquiries,
}

impl MenuOption {
    /// Menu order
    pub const ALL: [MenuOption; 4] = [
        MenuOption::Donate,
        MenuOption::Volunteer,
        MenuOption::Contact,
        MenuOption::GeneralInquiries,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuOption::Donate => "Donate",
            MenuOption::Volunteer => "Volunteer",
            MenuOption::Contact => "Contact",
            MenuOption::GeneralInquiries => "General Inquiries",
        }
    }

    /// Case-insensitive match against the labels
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        Self::ALL
            .into_iter()
            .find(|option| option.label().eq_ignore_ascii_case(input))
    }
}
