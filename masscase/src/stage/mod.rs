pub mod fanout;
pub mod notes;
pub mod resolve;

#[cfg(test)]
mod tests {
    use lib_api_clients::queue::QueueStatus;

    use crate::testing::{
        sample_inbound_email, test_config, FakeMail, FakeNotifier, FakeNova, FakeQueue, FakeTexts,
    };

    use super::{fanout, notes};

    /// Full pipeline against fakes: one form email with two identifiers ends
    /// as two Done tasks, two created cases and two appended notes.
    #[tokio::test]
    async fn test_producer_then_consumer_end_to_end() {
        let cfg = test_config();

        let mail = FakeMail::with_emails(vec![sample_inbound_email("mail-1", "Ikke valgt")]);
        mail.add_attachment("mail-1", "111111-1111\n222222-2222\n");
        let queue = FakeQueue::default();
        let notifier = FakeNotifier::default();

        fanout::run(&cfg, &mail, &queue, &notifier).await.unwrap();

        assert_eq!(queue.count_with_status(QueueStatus::New), 2);
        assert_eq!(mail.deleted.lock().unwrap().as_slice(), ["mail-1"]);

        let nova = FakeNova::default();
        nova.register_address("1111111111", "Anders Andersen");
        nova.register_address("2222222222", "Bente Bentsen");
        let texts = FakeTexts::default();

        notes::run(&cfg, &queue, &nova, &texts).await.unwrap();

        assert_eq!(queue.count_with_status(QueueStatus::Done), 2);
        assert_eq!(queue.count_with_status(QueueStatus::Failed), 0);

        let created = nova.created.lock().unwrap();
        assert_eq!(created.len(), 2);
        for case in created.iter() {
            assert_eq!(case.title, "Sag A");
            assert_eq!(case.sensitivity, "Følsomme");
            let department = case.responsible_department.as_ref().unwrap();
            assert_eq!(department.id, 818485);
            assert_eq!(department.name, "Borgerservice");
            assert_eq!(case.security_unit.as_ref().unwrap().user_key, "4BBORGER");
        }

        let notes = nova.notes.lock().unwrap();
        assert_eq!(notes.len(), 2);
        for (_, title, text) in notes.iter() {
            assert_eq!(title, "Note");
            assert_eq!(text, "hello world");
        }
    }
}
