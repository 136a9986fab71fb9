mod quiz;

use std::sync::Arc;

use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use dotenv::dotenv;
use teloxide::{
    dispatching::dialogue::InMemStorage,
    prelude::*,
    types::{ChatAction, ChatId, KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode},
    utils::html,
};

use quiz::ai_examiner::Examiner;
use quiz::session::{Advance, DiagnosisNeed, QuizSession, Submit};
use quiz::{
    deeplink, feedback, AssessmentType, Question, QuizConfig, Subject, GRADES, QUESTION_COUNT,
};

type QuizDialogue = Dialogue<State, InMemStorage<State>>;
type HandlerError = Box<dyn std::error::Error + Send + Sync>;
type HandlerResult = Result<(), HandlerError>;

#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    ReceiveSubject,
    ReceiveGrade {
        subject: Subject,
    },
    ReceiveUnit {
        subject: Subject,
        grade: u8,
    },
    ReceiveAssessType {
        subject: Subject,
        grade: u8,
        unit: String,
    },
    ReceiveDelivery {
        config: QuizConfig,
    },
    StudentReady {
        config: QuizConfig,
        student: Option<String>,
    },
    Quiz {
        session: QuizSession,
    },
    Finished {
        session: QuizSession,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let api_key = std::env::var("CHATGPT_API_KEY").expect("CHATGPT_API_KEY is not set");

    pretty_env_logger::init();
    log::info!("Starting assessment bot...");

    let bot = Bot::from_env();
    let me = bot
        .get_me()
        .await
        .expect("Failed to reach the Telegram Bot API");
    let bot_username = me.username().to_string();
    log::info!("Authorized as @{bot_username}");

    let gpt = {
        let mut gpt = ChatGPT::new(api_key).expect("Unable to connect with ChatGPT");

        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        // Five-question JSON papers take a while to come back.
        gpt.config.timeout = std::time::Duration::from_secs(60);

        gpt
    };

    let examiner = Arc::new(Examiner::new(gpt));
    let examiner_for_student = examiner.clone();
    let examiner_for_quiz = examiner.clone();
    let examiner_for_result = examiner.clone();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, InMemStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveSubject].endpoint(receive_subject))
            .branch(dptree::case![State::ReceiveGrade { subject }].endpoint(receive_grade))
            .branch(dptree::case![State::ReceiveUnit { subject, grade }].endpoint(receive_unit))
            .branch(
                dptree::case![State::ReceiveAssessType {
                    subject,
                    grade,
                    unit
                }]
                .endpoint(receive_assess_type),
            )
            .branch(dptree::case![State::ReceiveDelivery { config }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, config: QuizConfig, msg: Message| {
                    receive_delivery(
                        examiner.clone(),
                        bot_username.clone(),
                        bot,
                        dialogue,
                        config,
                        msg,
                    )
                },
            ))
            .branch(dptree::case![State::StudentReady { config, student }].endpoint(
                move |bot: Bot,
                      dialogue: QuizDialogue,
                      (config, student): (QuizConfig, Option<String>),
                      msg: Message| {
                    student_ready(
                        examiner_for_student.clone(),
                        bot,
                        dialogue,
                        (config, student),
                        msg,
                    )
                },
            ))
            .branch(dptree::case![State::Quiz { session }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, session: QuizSession, msg: Message| {
                    quiz_screen(examiner_for_quiz.clone(), bot, dialogue, session, msg)
                },
            ))
            .branch(dptree::case![State::Finished { session }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, session: QuizSession, msg: Message| {
                    finished(examiner_for_result.clone(), bot, dialogue, session, msg)
                },
            )),
    )
    .dependencies(dptree::deps![InMemStorage::<State>::new()])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const WELCOME_TEXT: &str = "🎓 歡迎使用適性化評量系統！\n請選擇科目領域：";

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    // Practice links open a fresh chat as "/start <payload>".
    if let Some(payload) = msg.text().and_then(|text| text.strip_prefix("/start ")) {
        let payload = payload.trim();
        if !payload.is_empty() {
            return open_practice_link(bot, dialogue, payload, msg.chat.id).await;
        }
    }

    bot.send_message(msg.chat.id, WELCOME_TEXT)
        .reply_markup(subject_keyboard())
        .await?;
    dialogue.update(State::ReceiveSubject).await?;
    Ok(())
}

const MALFORMED_LINK_TEXT: &str = "❌ 連結參數有誤，請聯繫老師重新產生連結。";

async fn open_practice_link(
    bot: Bot,
    dialogue: QuizDialogue,
    payload: &str,
    chat: ChatId,
) -> HandlerResult {
    let config = match deeplink::parse(payload) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("rejected practice link payload: {err}");
            bot.send_message(chat, MALFORMED_LINK_TEXT).await?;
            return Ok(());
        }
    };

    log::info!(
        "practice link opened: grade {} {} / {}",
        config.grade,
        config.subject.label(),
        config.unit
    );
    let welcome = format!(
        "👋 歡迎來到線上評量！\n\n📋 測驗資訊：{} 年級 {}／{}（{}）\n題目由 AI 老師即時生成，共 {} 題單選題。\n\n請先輸入你的姓名：",
        config.grade,
        config.subject.label(),
        config.unit,
        config.assess_type.policy().label,
        QUESTION_COUNT,
    );
    bot.send_message(chat, welcome).await?;
    dialogue
        .update(State::StudentReady {
            config,
            student: None,
        })
        .await?;
    Ok(())
}

async fn receive_subject(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    let subject = match msg.text().and_then(Subject::from_label) {
        Some(subject) => subject,
        None => {
            bot.send_message(msg.chat.id, "請從下方鍵盤選擇科目領域。")
                .reply_markup(subject_keyboard())
                .await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, "請選擇年級：")
        .reply_markup(grade_keyboard())
        .await?;
    dialogue.update(State::ReceiveGrade { subject }).await?;
    Ok(())
}

async fn receive_grade(
    bot: Bot,
    dialogue: QuizDialogue,
    subject: Subject,
    msg: Message,
) -> HandlerResult {
    let grade = msg
        .text()
        .and_then(|text| GRADES.find(|grade| grade_label(*grade) == text));
    let grade = match grade {
        Some(grade) => grade,
        None => {
            bot.send_message(msg.chat.id, "請從下方鍵盤選擇年級。")
                .reply_markup(grade_keyboard())
                .await?;
            return Ok(());
        }
    };

    bot.send_message(
        msg.chat.id,
        "請輸入這次要評量的單元或主題關鍵字（例如：分數的加減）：",
    )
    .reply_markup(KeyboardRemove::new())
    .await?;
    dialogue.update(State::ReceiveUnit { subject, grade }).await?;
    Ok(())
}

async fn receive_unit(
    bot: Bot,
    dialogue: QuizDialogue,
    (subject, grade): (Subject, u8),
    msg: Message,
) -> HandlerResult {
    let unit = msg.text().map(str::trim).unwrap_or_default();
    if unit.is_empty() || unit.starts_with('/') {
        bot.send_message(msg.chat.id, "請輸入單元名稱（文字）。")
            .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, assess_type_overview())
        .reply_markup(assess_type_keyboard())
        .await?;
    dialogue
        .update(State::ReceiveAssessType {
            subject,
            grade,
            unit: unit.to_string(),
        })
        .await?;
    Ok(())
}

async fn receive_assess_type(
    bot: Bot,
    dialogue: QuizDialogue,
    (subject, grade, unit): (Subject, u8, String),
    msg: Message,
) -> HandlerResult {
    let assess_type = match msg.text().and_then(AssessmentType::from_label) {
        Some(assess_type) => assess_type,
        None => {
            bot.send_message(msg.chat.id, "請從下方鍵盤選擇評量類型。")
                .reply_markup(assess_type_keyboard())
                .await?;
            return Ok(());
        }
    };

    let config = QuizConfig {
        subject,
        grade,
        unit,
        assess_type,
    };
    let summary = format!(
        "📋 評量設定完成！\n\n科目：{}\n年級：{} 年級\n單元：{}\n類型：{}\n\n要產生學生練習連結，還是自己先試做一次？",
        config.subject.label(),
        config.grade,
        config.unit,
        config.assess_type.policy().label,
    );
    bot.send_message(msg.chat.id, summary)
        .reply_markup(delivery_keyboard())
        .await?;
    dialogue.update(State::ReceiveDelivery { config }).await?;
    Ok(())
}

const MAKE_LINK_BUTTON: &str = "🔗 產生學生連結";
const SELF_TEST_BUTTON: &str = "📝 自己先試做";

async fn receive_delivery(
    examiner: Arc<Examiner>,
    bot_username: String,
    bot: Bot,
    dialogue: QuizDialogue,
    config: QuizConfig,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(MAKE_LINK_BUTTON) => {
            match deeplink::practice_link(&bot_username, &config) {
                Some(link) => {
                    log::info!(
                        "practice link issued: grade {} {} / {}",
                        config.grade,
                        config.subject.label(),
                        config.unit
                    );
                    bot.send_message(
                        msg.chat.id,
                        format!(
                            "✅ 連結已產生！請複製下方連結傳給學生：\n\n<code>{link}</code>\n\n學生點開連結後依指示作答即可。"
                        ),
                    )
                    .parse_mode(ParseMode::Html)
                    .await?;
                }
                None => {
                    bot.send_message(
                        msg.chat.id,
                        "⚠️ 單元名稱過長，無法放入連結，請用較短的關鍵字重新設定。",
                    )
                    .await?;
                }
            }
            // Stay here: the teacher may still self-test or issue the link again.
            Ok(())
        }
        Some(SELF_TEST_BUTTON) => {
            let questions =
                match generate_with_notice(&examiner, &bot, msg.chat.id, &config).await? {
                    Some(questions) => questions,
                    None => return Ok(()),
                };
            let session = QuizSession::begin(config, None, false, questions);
            enter_quiz(&examiner, &bot, &dialogue, msg.chat.id, session).await
        }
        _ => {
            bot.send_message(msg.chat.id, "請選擇下一步：產生連結或自己試做。")
                .reply_markup(delivery_keyboard())
                .await?;
            Ok(())
        }
    }
}

const START_QUIZ_BUTTON: &str = "🚀 開始測驗";

async fn student_ready(
    examiner: Arc<Examiner>,
    bot: Bot,
    dialogue: QuizDialogue,
    (config, student): (QuizConfig, Option<String>),
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let text = msg.text().map(str::trim).unwrap_or_default();

    if text == START_QUIZ_BUTTON {
        if student.is_none() {
            bot.send_message(chat, "請先輸入你的姓名。").await?;
            return Ok(());
        }
        let questions = match generate_with_notice(&examiner, &bot, chat, &config).await? {
            Some(questions) => questions,
            // The stored state is untouched, so the student may try again.
            None => return Ok(()),
        };
        let session = QuizSession::begin(config, student, true, questions);
        return enter_quiz(&examiner, &bot, &dialogue, chat, session).await;
    }

    if text.is_empty() || text.starts_with('/') {
        bot.send_message(chat, "請輸入你的姓名（文字）。").await?;
        return Ok(());
    }

    bot.send_message(
        chat,
        format!("你好，{text}！準備好之後請按「{START_QUIZ_BUTTON}」。"),
    )
    .reply_markup(start_keyboard())
    .await?;
    dialogue
        .update(State::StudentReady {
            config,
            student: Some(text.to_string()),
        })
        .await?;
    Ok(())
}

const NEXT_BUTTON: &str = "下一題 ➡️";

async fn quiz_screen(
    examiner: Arc<Examiner>,
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: QuizSession,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    let text = msg.text().unwrap_or_default();

    if session.revealed {
        if text != NEXT_BUTTON {
            bot.send_message(chat, format!("請按「{NEXT_BUTTON}」繼續。"))
                .await?;
            return Ok(());
        }
        match session.advance() {
            Advance::Next | Advance::Pending => {
                render_question(&bot, chat, &session).await?;
                dialogue.update(State::Quiz { session }).await?;
            }
            Advance::Finished => {
                render_result(&examiner, &bot, chat, &mut session).await?;
                dialogue.update(State::Finished { session }).await?;
            }
        }
        return Ok(());
    }

    let choice = session.current_question().and_then(|question| {
        question
            .options
            .iter()
            .position(|option| option.as_str() == text)
    });
    let choice = match choice {
        Some(choice) => choice as u8,
        None => {
            bot.send_message(chat, "請從下方選項中選擇答案。").await?;
            return Ok(());
        }
    };

    if let Submit::Revealed { correct } = session.submit(choice) {
        render_reveal(&bot, chat, &session, correct).await?;
        dialogue.update(State::Quiz { session }).await?;
    }
    Ok(())
}

const RETRY_BUTTON: &str = "🔄 再練習一次";
const HOME_BUTTON: &str = "🔄 回到首頁";

async fn finished(
    examiner: Arc<Examiner>,
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: QuizSession,
    msg: Message,
) -> HandlerResult {
    let chat = msg.chat.id;
    match msg.text() {
        Some(RETRY_BUTTON) if session.via_link => {
            let questions =
                match generate_with_notice(&examiner, &bot, chat, &session.config).await? {
                    Some(questions) => questions,
                    None => return Ok(()),
                };
            enter_quiz(&examiner, &bot, &dialogue, chat, session.renew(questions)).await
        }
        Some(HOME_BUTTON) if !session.via_link => {
            bot.send_message(chat, WELCOME_TEXT)
                .reply_markup(subject_keyboard())
                .await?;
            dialogue.update(State::ReceiveSubject).await?;
            Ok(())
        }
        _ => {
            // The diagnosis is already stored, so this re-render never
            // consults the examiner again.
            render_result(&examiner, &bot, chat, &mut session).await?;
            dialogue.update(State::Finished { session }).await?;
            Ok(())
        }
    }
}

/// Runs one question-generation call with the waiting notice, surfacing
/// failures to the user. `None` means the caller stays on its screen.
async fn generate_with_notice(
    examiner: &Examiner,
    bot: &Bot,
    chat: ChatId,
    config: &QuizConfig,
) -> Result<Option<Vec<Question>>, HandlerError> {
    // Cosmetic, so a failure is ignored.
    let _ = bot.send_chat_action(chat, ChatAction::Typing).await;
    bot.send_message(chat, "📝 正在準備試卷中，請稍候…").await?;

    log::info!(
        "generating questions: grade {} {} / {} ({})",
        config.grade,
        config.subject.label(),
        config.unit,
        config.assess_type.code(),
    );
    match examiner.generate_questions(config).await {
        Ok(questions) => Ok(Some(questions)),
        Err(err) => {
            log::warn!("question generation failed: {err}");
            bot.send_message(chat, format!("❌ 題目生成失敗：{err}\n請再試一次。"))
                .await?;
            Ok(None)
        }
    }
}

/// Puts a freshly started session on screen: the first question, or the
/// result right away when the set is somehow empty.
async fn enter_quiz(
    examiner: &Examiner,
    bot: &Bot,
    dialogue: &QuizDialogue,
    chat: ChatId,
    mut session: QuizSession,
) -> HandlerResult {
    if session.is_finished() {
        render_result(examiner, bot, chat, &mut session).await?;
        dialogue.update(State::Finished { session }).await?;
        return Ok(());
    }

    render_question(bot, chat, &session).await?;
    dialogue.update(State::Quiz { session }).await?;
    Ok(())
}

async fn render_question(bot: &Bot, chat: ChatId, session: &QuizSession) -> HandlerResult {
    let question = match session.current_question() {
        Some(question) => question,
        None => return Ok(()),
    };

    let text = format!(
        "{} <b>第 {} / {} 題</b>\n🧠 認知層次：{}\n\n{}",
        progress_bar(session.current, session.total()),
        session.current + 1,
        session.total(),
        html::escape(&question.bloom_level),
        html::escape(&question.text),
    );
    let keyboard = KeyboardMarkup::new(
        question
            .options
            .iter()
            .map(|option| vec![KeyboardButton::new(option.clone())])
            .collect::<Vec<_>>(),
    );
    bot.send_message(chat, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn render_reveal(
    bot: &Bot,
    chat: ChatId,
    session: &QuizSession,
    correct: bool,
) -> HandlerResult {
    let question = match session.current_question() {
        Some(question) => question,
        None => return Ok(()),
    };

    let banner = if correct {
        "🎉 答對了！".to_string()
    } else {
        format!(
            "💪 加油！正確答案是：{}",
            html::escape(&question.options[question.ans as usize])
        )
    };
    let text = format!(
        "{banner}\n\n📖 <b>解析</b>\n{}",
        html::escape(&question.explanation)
    );
    bot.send_message(chat, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(next_keyboard())
        .await?;
    Ok(())
}

const NO_MISCONCEPTION_TEXT: &str = "表現優異，無顯著迷思概念。";
const DIAGNOSIS_FALLBACK_TEXT: &str = "無法生成診斷報告。";

/// Renders the result screen. The diagnosis is computed on the first entry
/// only; the empty-string sentinel on the session guards the model call.
async fn render_result(
    examiner: &Examiner,
    bot: &Bot,
    chat: ChatId,
    session: &mut QuizSession,
) -> HandlerResult {
    match session.diagnosis_need() {
        DiagnosisNeed::Done => {}
        DiagnosisNeed::NoMistakes => {
            session.diagnosis = NO_MISCONCEPTION_TEXT.to_string();
        }
        DiagnosisNeed::Consult => {
            let _ = bot.send_chat_action(chat, ChatAction::Typing).await;
            bot.send_message(chat, "🔎 AI 老師正在分析學習狀況，請稍候…")
                .await?;
            session.diagnosis = match examiner
                .generate_diagnosis(&session.config, &session.mistakes())
                .await
            {
                Ok(diagnosis) => diagnosis,
                // The score screen is still useful without it.
                Err(err) => {
                    log::warn!("diagnosis generation failed: {err}");
                    DIAGNOSIS_FALLBACK_TEXT.to_string()
                }
            };
        }
    }

    let correct = session.correct_count();
    let total = session.history.len();
    let mut text = format!(
        "🏁 測驗結束！\n\n<b>{}</b>\n答對題數：{correct}／{total}\n\n👨‍🏫 <b>教師專用：學習診斷分析</b>\n{}",
        feedback::headline(correct, total),
        html::escape(&session.diagnosis),
    );

    let mistakes = session.mistakes();
    if !mistakes.is_empty() {
        text.push_str("\n\n📝 <b>錯題回顧</b>");
        for (idx, record) in mistakes.iter().enumerate() {
            text.push_str(&format!(
                "\n\n{}. {}\n❌ 你的答案：{}\n✅ 正確答案：{}\n💡 解析：{}",
                idx + 1,
                html::escape(&record.question.text),
                html::escape(record.chosen_text()),
                html::escape(record.answer_text()),
                html::escape(&record.question.explanation),
            ));
        }
    }

    let keyboard = if session.via_link {
        KeyboardMarkup::new(vec![vec![KeyboardButton::new(RETRY_BUTTON)]])
    } else {
        KeyboardMarkup::new(vec![vec![KeyboardButton::new(HOME_BUTTON)]])
    };
    bot.send_message(chat, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

fn subject_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![Subject::ALL
        .iter()
        .map(|subject| KeyboardButton::new(subject.label()))
        .collect::<Vec<_>>()])
}

fn grade_label(grade: u8) -> String {
    format!("{grade} 年級")
}

fn grade_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        (1..=3u8)
            .map(|grade| KeyboardButton::new(grade_label(grade)))
            .collect::<Vec<_>>(),
        (4..=6u8)
            .map(|grade| KeyboardButton::new(grade_label(grade)))
            .collect::<Vec<_>>(),
    ])
}

fn assess_type_overview() -> String {
    let mut text = String::from("請選擇評量類型：\n");
    for assess in AssessmentType::ALL {
        let policy = assess.policy();
        text.push_str(&format!("\n▫️ {}\n{}\n", policy.label, policy.description));
    }
    text
}

fn assess_type_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(
        AssessmentType::ALL
            .iter()
            .map(|assess| vec![KeyboardButton::new(assess.policy().label)])
            .collect::<Vec<_>>(),
    )
}

fn delivery_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(MAKE_LINK_BUTTON),
        KeyboardButton::new(SELF_TEST_BUTTON),
    ]])
}

fn start_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(START_QUIZ_BUTTON)]])
}

fn next_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(NEXT_BUTTON)]])
}

/// Filled-versus-empty strip shown above each question.
fn progress_bar(current: usize, total: usize) -> String {
    (0..total).map(|i| if i <= current { '▰' } else { '▱' }).collect()
}
