use anyhow::{Context, Result};
use log::{info, warn};
use quiz_study::cli::Cli;
use quiz_study::commands::{
    clear_wrong_questions, discard_saved_session, home_overview, parse_count, parse_mode, quiz_view,
    remove_wrong_question, result_view, wrong_questions_by_bank, BlankState, QuizView, ResultView,
};
use quiz_study::models::{Choice, Question, QuizMode};
use quiz_study::services::{
    passage_segments, AnswerFeedback, BankRegistry, Confirm, MemoryStore, PassageSegment,
    PersistenceStore, QuizController, ReviewStatus, SqliteStore, StartRequest,
};
use quiz_study::utils::{init_logging, now_millis};
use std::io::{self, Write};

const HELP: &str = "\
首页: list | start <题库> [数量] [study] | continue <题库> [study] | review [study]
      wrong | remove-wrong <题库> <题号> | clear-wrong | discard <题库> | quit
答题: a/b/c/d 选择 | n 下一题 | p 上一题 | sub <i> 切换小题 | go <i> 跳转
      shuffle 重新打乱 | enter 确认并继续(学习模式) | submit 交卷
      pause 暂停(保留进度) | restart 放弃进度 | help";

/// 终端响铃加对错标记
struct TerminalFeedback;

impl AnswerFeedback for TerminalFeedback {
    fn on_reveal(&self, correct: bool) {
        if correct {
            println!("\x07✓ 回答正确");
        } else {
            println!("\x07✗ 回答错误");
        }
    }
}

/// 从标准输入读取 y/n
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn main() -> Result<()> {
    let config = Cli::get().into_config()?;
    init_logging(config.log_level, config.log_file.as_deref())?;

    let store = if config.in_memory {
        info!("使用内存存储，退出后数据不保留");
        PersistenceStore::new(MemoryStore::new())
    } else {
        match SqliteStore::open(&config.database_path) {
            Ok(sqlite) => PersistenceStore::new(sqlite),
            Err(e) => {
                warn!("存储不可用，进度和错题不会被保存: {:#}", e);
                PersistenceStore::headless()
            }
        }
    };
    let registry = BankRegistry::load_dir(&config.banks_dir)
        .with_context(|| format!("加载题库失败: {}", config.banks_dir.display()))?;

    let mut app = App {
        registry: &registry,
        store: &store,
        feedback: &TerminalFeedback,
        default_count: config.default_count,
        active: None,
    };
    app.run()
}

struct App<'a> {
    registry: &'a BankRegistry,
    store: &'a PersistenceStore,
    feedback: &'a TerminalFeedback,
    default_count: usize,
    active: Option<QuizController<'a>>,
}

impl<'a> App<'a> {
    fn run(&mut self) -> Result<()> {
        self.print_home();
        println!("{}", HELP);

        let mut line = String::new();
        loop {
            print!("> ");
            io::stdout().flush()?;
            line.clear();
            if io::stdin().read_line(&mut line)? == 0 {
                break;
            }
            let words: Vec<&str> = line.split_whitespace().collect();
            let Some((&command, args)) = words.split_first() else {
                continue;
            };
            if command == "quit" || command == "q" {
                break;
            }
            self.handle(command, args);
        }

        if let Some(ctrl) = &self.active {
            if !ctrl.is_review() {
                println!("进度已保存，下次可以用 continue {} 继续。", ctrl.bank_id());
            }
        }
        Ok(())
    }

    fn handle(&mut self, command: &str, args: &[&str]) {
        match command {
            "help" | "?" => println!("{}", HELP),
            "list" => self.print_home(),
            "start" => {
                let Some(bank_id) = args.first() else {
                    println!("用法: start <题库> [数量] [study]");
                    return;
                };
                let count = match args.get(1).filter(|s| parse_mode(s).is_none()) {
                    Some(s) => match parse_count(s) {
                        Some(count) => count,
                        None => {
                            println!("题目数量必须是正整数");
                            return;
                        }
                    },
                    None => self.default_count,
                };
                let mode = args.iter().skip(1).find_map(|s| parse_mode(s)).unwrap_or_default();
                self.open(StartRequest::new(bank_id, count).mode(mode));
            }
            "continue" => match args.first() {
                Some(bank_id) => {
                    // 没有保存的进度时按这个模式新开一轮
                    let mode = args.get(1).and_then(|s| parse_mode(s)).unwrap_or_default();
                    self.open(StartRequest::new(bank_id, self.default_count).mode(mode).resume())
                }
                None => println!("用法: continue <题库> [study]"),
            },
            "review" => {
                let mode = args.first().and_then(|s| parse_mode(s)).unwrap_or_default();
                self.open(StartRequest::review().mode(mode));
            }
            "wrong" => self.print_wrong(),
            "remove-wrong" => match (args.first(), args.get(1).and_then(|s| s.parse().ok())) {
                (Some(bank_id), Some(id)) => {
                    if remove_wrong_question(self.store, bank_id, id) {
                        println!("已移除");
                    } else {
                        println!("错题本中没有这道题");
                    }
                }
                _ => println!("用法: remove-wrong <题库> <题号>"),
            },
            "clear-wrong" => {
                if clear_wrong_questions(self.store, &StdinConfirm) {
                    println!("错题本已清空");
                }
            }
            "discard" => match args.first() {
                Some(bank_id) => {
                    if discard_saved_session(self.store, bank_id, &StdinConfirm) {
                        println!("进度已删除");
                    }
                }
                None => println!("用法: discard <题库>"),
            },
            _ => self.handle_quiz(command, args),
        }
    }

    fn open(&mut self, request: StartRequest) {
        match QuizController::open(self.registry, self.store, self.feedback, &request) {
            Ok(ctrl) => {
                if ctrl.was_resumed() {
                    println!("继续上次的进度");
                }
                self.active = Some(ctrl);
                self.print_current();
            }
            Err(reason) => {
                println!("{}", reason);
                self.print_home();
            }
        }
    }

    fn handle_quiz(&mut self, command: &str, args: &[&str]) {
        let Some(ctrl) = self.active.as_mut() else {
            println!("未知命令: {}（输入 help 查看帮助）", command);
            return;
        };
        let index_arg = args.first().and_then(|s| s.parse::<usize>().ok()).map(|i| i.saturating_sub(1));

        if let Some(choice) = Choice::from_letter(command) {
            select(ctrl, choice);
        } else {
            match command {
                "n" | "next" => ctrl.advance(),
                "p" | "prev" => ctrl.retreat(),
                "sub" => match index_arg {
                    Some(i) => ctrl.set_active_sub_index(i),
                    None => println!("用法: sub <小题序号>"),
                },
                "go" => match index_arg {
                    Some(i) => ctrl.jump_to(i),
                    None => println!("用法: go <题号>"),
                },
                "shuffle" => ctrl.shuffle_remaining(),
                "enter" => ctrl.confirm(),
                "submit" => {
                    if !ctrl.state().can_submit() {
                        println!("至少回答一道题后才能交卷");
                        return;
                    }
                    let view = result_view(ctrl.submit());
                    self.active = None;
                    print_result(&view);
                    return;
                }
                "pause" => {
                    self.leave(true);
                    return;
                }
                "restart" => {
                    self.leave(false);
                    return;
                }
                _ => {
                    println!("未知命令: {}（输入 help 查看帮助）", command);
                    return;
                }
            }
        }
        self.print_current();
    }

    /// 暂停（保留进度）或放弃进度；拒绝确认时继续答题
    fn leave(&mut self, keep_progress: bool) {
        let Some(ctrl) = self.active.take() else {
            return;
        };
        let outcome = if keep_progress {
            ctrl.abandon(&StdinConfirm)
        } else {
            ctrl.reset(&StdinConfirm)
        };
        match outcome {
            Ok(()) => self.print_home(),
            Err(ctrl) => self.active = Some(ctrl),
        }
    }

    fn print_current(&self) {
        if let Some(view) = self.active.as_ref().and_then(quiz_view) {
            print_view(&view);
        }
    }

    fn print_home(&self) {
        let home = home_overview(self.registry, self.store, now_millis());
        println!("题库:");
        for bank in &home.banks {
            print!("  {:<12} {} - {}", bank.summary.id, bank.summary.name, bank.summary.description);
            if let Some(saved) = &bank.saved {
                print!(
                    "  [进度 {}/{}，第 {}/{} 题，{}]",
                    saved.answered_units, saved.total_units, saved.position, saved.total_items, saved.time_ago
                );
            }
            println!();
        }
        println!("错题本: {} 道", home.wrong_count);
    }

    fn print_wrong(&self) {
        let groups = wrong_questions_by_bank(self.store);
        if groups.is_empty() {
            println!("错题本是空的");
            return;
        }
        for group in groups {
            println!("{} ({}) - {} 道", group.bank_name, group.bank_id, group.records.len());
            for record in &group.records {
                let title = match &record.question {
                    Question::Single(q) => q.question.clone(),
                    Question::Passage(p) => p
                        .passage_title
                        .clone()
                        .unwrap_or_else(|| p.passage_type.label().to_string()),
                };
                println!("  #{} {} (你的答案 {})", record.question.id(), title, record.selected_answer);
            }
        }
    }
}

/// 选项字母：单选题直接作答；材料题作用于当前小题
fn select(ctrl: &mut QuizController<'_>, choice: Choice) {
    let active_sub = ctrl.state().active_sub_question().map(|sq| sq.id);
    match active_sub {
        Some(sub_id) => ctrl.select_sub_answer(sub_id, choice),
        None => ctrl.select_answer(choice),
    }
}

fn print_view(view: &QuizView) {
    let mode = match view.mode {
        QuizMode::Quiz => "测验",
        QuizMode::Study => "学习",
    };
    println!();
    println!(
        "{} [{}] 第 {}/{} 题  已答 {}/{} ({}%)  用时 {}",
        view.bank_name, mode, view.position, view.total_items, view.answered, view.total_units, view.progress_percent, view.elapsed
    );
    let grid: String = view
        .answered_grid
        .iter()
        .enumerate()
        .map(|(i, done)| match (i + 1 == view.position, done) {
            (true, _) => '▶',
            (false, true) => '●',
            (false, false) => '○',
        })
        .collect();
    println!("{}", grid);

    let (sub, selected) = match &view.question {
        Question::Single(q) => (q, view.answer.selected_answer),
        Question::Passage(p) => {
            if let Some(title) = &p.passage_title {
                println!("【{}】{}", p.passage_type.label(), title);
            }
            let mut text = String::new();
            for segment in passage_segments(&p.passage) {
                match segment {
                    PassageSegment::Text(t) => text.push_str(t),
                    PassageSegment::Blank(id) => {
                        let blank = view.blanks.iter().find(|b| b.sub_id == id);
                        let letter = blank.and_then(|b| b.selected).map(|c| c.as_str()).unwrap_or("_");
                        let mark = match blank.map(|b| b.state) {
                            Some(BlankState::Active) => format!("【{}:{}】", id, letter),
                            Some(BlankState::Correct) => format!("[{}:{}✓]", id, letter),
                            Some(BlankState::Wrong) => format!("[{}:{}✗]", id, letter),
                            _ => format!("[{}:{}]", id, letter),
                        };
                        text.push_str(&mark);
                    }
                }
            }
            println!("{}", text);
            let Some(sub) = p.sub_questions.get(view.active_sub_index) else {
                return;
            };
            println!("小题 {}/{}", view.active_sub_index + 1, p.sub_questions.len());
            (sub, view.answer.sub_answer(sub.id))
        }
    };

    println!("{}", sub.question);
    for (choice, text) in sub.options.iter() {
        let marker = if selected == Some(choice) { '*' } else { ' ' };
        println!(" {}{}. {}", marker, choice, text);
    }
    if view.revealed {
        println!("正确答案: {}", sub.correct_answer);
        if let Some(explanation) = &sub.explanation {
            println!("解析: {}", explanation);
        }
    }
}

fn print_result(view: &ResultView) {
    println!();
    println!("{} 成绩: {}% ({}/{})", view.bank_name, view.percentage, view.correct_count, view.total_units);
    println!("{}", view.message);
    if view.wrong_count > 0 {
        println!("{} 道错题已加入错题本", view.wrong_count);
    }
    for item in &view.items {
        let status = match item.status {
            ReviewStatus::Correct => "✓",
            ReviewStatus::Incorrect => "✗",
            ReviewStatus::Unanswered => "-",
        };
        match &item.question {
            Question::Single(q) => {
                let selected = item.selected.map(|c| c.to_string()).unwrap_or_else(|| "未答".into());
                println!("{} {}. {} (你的答案 {}，正确答案 {})", status, item.index + 1, q.question, selected, q.correct_answer);
            }
            Question::Passage(p) => {
                println!("{} {}. {} 答对 {}/{}", status, item.index + 1, p.passage_type.label(), item.correct_units, item.total_units);
                for blank in &item.blanks {
                    let correct = p.sub_question(blank.sub_id).map(|sq| sq.correct_answer.as_str()).unwrap_or("?");
                    let selected = blank.selected.map(|c| c.as_str()).unwrap_or("未答");
                    println!("    空 {}: {} / {}", blank.sub_id, selected, correct);
                }
            }
        }
    }
}
