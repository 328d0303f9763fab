//! Offline walk-through of the memory window using a scripted model.

use mentor_core::{
    ChatSession, Conversation, ModelCatalog, PromptStyle, RequestBuilder, Result,
    SessionSettings, StubModel,
};

#[tokio::main]
async fn main() -> Result<()> {
    let model = StubModel::new(vec![
        "A value has exactly one owner.".into(),
        "Borrowing lends access without moving ownership.".into(),
        "Lifetimes tell the compiler how long a borrow lives.".into(),
        r#"{"action":"fail","error":"simulated provider outage"}"#.into(),
    ]);
    let conversation = Conversation::new(model.clone())
        .with_request_builder(RequestBuilder::new(PromptStyle::Messages));

    let catalog = ModelCatalog::default();
    let mut session = ChatSession::new(SessionSettings::for_catalog(&catalog));
    session.set_memory_length(2)?;

    for question in [
        "What is ownership?",
        "What is borrowing?",
        "What are lifetimes?",
        "Summarise everything.",
    ] {
        match conversation.predict(&mut session, question).await {
            Ok(Some(answer)) => println!("You: {question}\nChatbot: {answer}\n"),
            Ok(None) => {}
            Err(err) => println!("You: {question}\nError: {err}\n"),
        }
    }

    for (i, request) in model.requests().iter().enumerate() {
        println!(
            "request {} carried {} message(s)",
            i + 1,
            request.messages.len()
        );
    }
    println!("stored turns: {}", session.history().len());
    Ok(())
}
