// 命令模块
// 提供供界面调用的命令接口和传输对象

pub mod library;
pub mod quiz;

pub use library::{
    clear_wrong_questions,
    discard_saved_session,
    home_overview,
    remove_wrong_question,
    wrong_questions_by_bank,
    BankOverviewDto,
    HomeOverview,
    SavedSessionDto,
    WrongGroupDto,
};

pub use quiz::{
    parse_count,
    parse_mode,
    quiz_view,
    result_view,
    BlankState,
    BlankView,
    QuizView,
    ResultView,
    ReviewItemView,
};
